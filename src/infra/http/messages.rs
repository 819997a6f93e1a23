//! Envelope messages per entity and action.

use crate::domain::types::EntityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Show,
    Create,
    Update,
    Delete,
}

pub fn success(entity: EntityType, action: Action) -> &'static str {
    use Action::*;
    use EntityType::*;

    match (entity, action) {
        (Project, List) => "Projects Retrieved Successfully",
        (Project, Show) => "Project Retrieved Successfully",
        (Project, Create) => "Project Created",
        (Project, Update) => "Project Updated",
        (Project, Delete) => "Project deleted successfully",
        (TimeFrame, List) => "Timeframes Retrieved Successfully",
        (TimeFrame, Show) => "TimeFrame Retrieved Successfully",
        (TimeFrame, Create) => "TimeFrame Created",
        (TimeFrame, Update) => "TimeFrame Updated",
        (TimeFrame, Delete) => "TimeFrame deleted successfully",
        (TimeEntry, List) => "Time Entries Retrieved Successfully",
        (TimeEntry, Show) => "Time Entry Retrieved Successfully",
        (TimeEntry, Create) => "Time Entry Created",
        (TimeEntry, Update) => "Time Entry Updated",
        (TimeEntry, Delete) => "Time Entry deleted successfully",
        (Preference, List | Show) => "Preferences Retrieved Successfully",
        (Preference, Create) => "Preferences Created",
        (Preference, Update) => "Preference Updated",
        (Preference, Delete) => "Preference deleted successfully",
    }
}

pub fn failure(entity: EntityType, action: Action) -> &'static str {
    use Action::*;
    use EntityType::*;

    match (entity, action) {
        (Project, List) => "Projects Retrieval Error",
        (Project, Show) => "Project Error",
        (Project, Create) => "Project Creation Error",
        (Project, Update) => "Project Update Error",
        (Project, Delete) => "Project deletion failed",
        (TimeFrame, List) => "Timeframes Retrieval Error",
        (TimeFrame, Show) => "TimeFrame Error",
        (TimeFrame, Create) => "TimeFrame Creation Error",
        (TimeFrame, Update) => "TimeFrame Update Error",
        (TimeFrame, Delete) => "TimeFrame deletion failed",
        (TimeEntry, List) => "Time Entries Retrieval Error",
        (TimeEntry, Show) => "Time Entry Error",
        (TimeEntry, Create) => "Time Entry Creation Error",
        (TimeEntry, Update) => "Time Entry Update Error",
        (TimeEntry, Delete) => "Time Entry deletion failed",
        (Preference, List | Show) => "Preferences Retrieval Error",
        (Preference, Create) => "Preferences Creation Error",
        (Preference, Update) => "Preference Update Error",
        (Preference, Delete) => "Preference deletion failed",
    }
}

pub fn not_found(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Project => "Project not found",
        EntityType::TimeFrame => "TimeFrame not found",
        EntityType::TimeEntry => "Time Entry not found",
        EntityType::Preference => "Preference not found",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages_name_the_action() {
        assert_eq!(
            failure(EntityType::TimeFrame, Action::List),
            "Timeframes Retrieval Error"
        );
        assert_eq!(
            failure(EntityType::TimeEntry, Action::Create),
            "Time Entry Creation Error"
        );
    }

    #[test]
    fn every_entity_has_a_not_found_message() {
        for entity in EntityType::ALL {
            assert!(not_found(entity).ends_with("not found"));
        }
    }
}
