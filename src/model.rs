use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Lecturer,
    Coordinator,
    Dean,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "lecturer" => Some(Self::Lecturer),
            "coordinator" => Some(Self::Coordinator),
            "dean" => Some(Self::Dean),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Lecturer => "lecturer",
            Self::Coordinator => "coordinator",
            Self::Dean => "dean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semester {
    Fall,
    Spring,
    Summer,
}

impl Semester {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fall" => Some(Self::Fall),
            "spring" => Some(Self::Spring),
            "summer" => Some(Self::Summer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fall => "Fall",
            Self::Spring => "Spring",
            Self::Summer => "Summer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    Draft,
    Submitted,
    #[serde(rename = "Under Review")]
    UnderReview,
    Approved,
    Rejected,
}

impl ProjectStatus {
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::Approved,
        Self::Rejected,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::UnderReview => "Under Review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectType {
    Capstone,
    #[serde(rename = "Competition Work")]
    CompetitionWork,
    #[serde(rename = "Academic Publication")]
    AcademicPublication,
    #[serde(rename = "Social Service")]
    SocialService,
    Other,
}

impl ProjectType {
    pub const ALL: [Self; 5] = [
        Self::Capstone,
        Self::CompetitionWork,
        Self::AcademicPublication,
        Self::SocialService,
        Self::Other,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capstone => "Capstone",
            Self::CompetitionWork => "Competition Work",
            Self::AcademicPublication => "Academic Publication",
            Self::SocialService => "Social Service",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_insensitive_and_closed() {
        assert_eq!(Role::parse(" Dean "), Some(Role::Dean));
        assert_eq!(Role::parse("STUDENT"), Some(Role::Student));
        assert_eq!(Role::parse("admin"), None);
        for r in [Role::Student, Role::Lecturer, Role::Coordinator, Role::Dean] {
            assert_eq!(Role::parse(r.as_str()), Some(r));
        }
    }

    #[test]
    fn status_and_semester_use_display_casing() {
        assert_eq!(UserStatus::parse("inactive"), Some(UserStatus::Inactive));
        assert_eq!(UserStatus::Active.as_str(), "Active");
        assert_eq!(Semester::parse("SPRING"), Some(Semester::Spring));
        assert_eq!(Semester::parse("Winter"), None);
        assert_eq!(
            serde_json::to_value(Role::Coordinator).expect("serialize role"),
            serde_json::json!("coordinator")
        );
        assert_eq!(
            serde_json::to_value(UserStatus::Inactive).expect("serialize status"),
            serde_json::json!("Inactive")
        );
    }

    #[test]
    fn project_enums_round_trip_display_names() {
        assert_eq!(ProjectStatus::parse("under review"), Some(ProjectStatus::UnderReview));
        assert_eq!(ProjectStatus::parse("Revision"), None);
        assert_eq!(
            ProjectType::parse("competition work"),
            Some(ProjectType::CompetitionWork)
        );
        assert_eq!(Impact::parse("HIGH"), Some(Impact::High));
        for t in ProjectType::ALL {
            assert_eq!(
                serde_json::to_value(t).expect("serialize type"),
                serde_json::json!(t.as_str())
            );
        }
        assert_eq!(
            serde_json::to_value(ProjectStatus::UnderReview).expect("serialize status"),
            serde_json::json!("Under Review")
        );
    }
}
