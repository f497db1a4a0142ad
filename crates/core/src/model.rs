#![forbid(unsafe_code)]

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PositionType {
    StructuralEngineer,
    Architect,
    LicenceEngineer,
    Supervisor1,
    Supervisor2,
}

impl PositionType {
    pub const ALL: [PositionType; 5] = [
        PositionType::StructuralEngineer,
        PositionType::Architect,
        PositionType::LicenceEngineer,
        PositionType::Supervisor1,
        PositionType::Supervisor2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PositionType::StructuralEngineer => "structural_engineer",
            PositionType::Architect => "architect",
            PositionType::LicenceEngineer => "licence_engineer",
            PositionType::Supervisor1 => "supervisor1",
            PositionType::Supervisor2 => "supervisor2",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OfficerRole {
    JuniorEngineer,
    AssistantEngineerStructural,
    AssistantEngineerArchitect,
    AssistantEngineerLicence,
    AssistantEngineerSupervisor1,
    AssistantEngineerSupervisor2,
    ExecutiveEngineer,
    CityEngineer,
    Clerk,
    Admin,
}

impl OfficerRole {
    pub const ALL: [OfficerRole; 10] = [
        OfficerRole::JuniorEngineer,
        OfficerRole::AssistantEngineerStructural,
        OfficerRole::AssistantEngineerArchitect,
        OfficerRole::AssistantEngineerLicence,
        OfficerRole::AssistantEngineerSupervisor1,
        OfficerRole::AssistantEngineerSupervisor2,
        OfficerRole::ExecutiveEngineer,
        OfficerRole::CityEngineer,
        OfficerRole::Clerk,
        OfficerRole::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OfficerRole::JuniorEngineer => "junior_engineer",
            OfficerRole::AssistantEngineerStructural => "ae_structural",
            OfficerRole::AssistantEngineerArchitect => "ae_architect",
            OfficerRole::AssistantEngineerLicence => "ae_licence",
            OfficerRole::AssistantEngineerSupervisor1 => "ae_supervisor1",
            OfficerRole::AssistantEngineerSupervisor2 => "ae_supervisor2",
            OfficerRole::ExecutiveEngineer => "executive_engineer",
            OfficerRole::CityEngineer => "city_engineer",
            OfficerRole::Clerk => "clerk",
            OfficerRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(value))
    }

    pub fn title(self) -> &'static str {
        match self {
            OfficerRole::JuniorEngineer => "Junior Engineer",
            OfficerRole::AssistantEngineerStructural => "Assistant Engineer (Structural)",
            OfficerRole::AssistantEngineerArchitect => "Assistant Engineer (Architect)",
            OfficerRole::AssistantEngineerLicence => "Assistant Engineer (Licence)",
            OfficerRole::AssistantEngineerSupervisor1 => "Assistant Engineer (Supervisor 1)",
            OfficerRole::AssistantEngineerSupervisor2 => "Assistant Engineer (Supervisor 2)",
            OfficerRole::ExecutiveEngineer => "Executive Engineer",
            OfficerRole::CityEngineer => "City Engineer",
            OfficerRole::Clerk => "Clerk",
            OfficerRole::Admin => "Administrator",
        }
    }
}

/// Pipeline position of an application. `Rejected` is reachable from every review stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Submitted,
    JeReview,
    AeReview,
    EeReview,
    CeReview,
    ClerkProcessing,
    EeStage2Sign,
    CeStage2Sign,
    Completed,
    Rejected,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::Submitted,
        Stage::JeReview,
        Stage::AeReview,
        Stage::EeReview,
        Stage::CeReview,
        Stage::ClerkProcessing,
        Stage::EeStage2Sign,
        Stage::CeStage2Sign,
        Stage::Completed,
        Stage::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Submitted => "submitted",
            Stage::JeReview => "je_review",
            Stage::AeReview => "ae_review",
            Stage::EeReview => "ee_review",
            Stage::CeReview => "ce_review",
            Stage::ClerkProcessing => "clerk_processing",
            Stage::EeStage2Sign => "ee_stage2_sign",
            Stage::CeStage2Sign => "ce_stage2_sign",
            Stage::Completed => "completed",
            Stage::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(value))
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Rejected)
    }

    /// True for stages that are decided by an officer.
    pub fn is_review(self) -> bool {
        !matches!(self, Stage::Submitted | Stage::Completed | Stage::Rejected)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    Pending,
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Pending => "pending",
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Decision::Pending),
            "approved" | "approve" => Some(Decision::Approved),
            "rejected" | "reject" => Some(Decision::Rejected),
            _ => None,
        }
    }

    pub fn is_final(self) -> bool {
        !matches!(self, Decision::Pending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignmentStrategy {
    RoundRobin,
    LeastWorkload,
    Manual,
}

impl AssignmentStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStrategy::RoundRobin => "round_robin",
            AssignmentStrategy::LeastWorkload => "least_workload",
            AssignmentStrategy::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "round_robin" | "roundrobin" => Some(AssignmentStrategy::RoundRobin),
            "least_workload" | "leastworkload" => Some(AssignmentStrategy::LeastWorkload),
            "manual" => Some(AssignmentStrategy::Manual),
            _ => None,
        }
    }
}
