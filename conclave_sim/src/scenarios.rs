//! Built-in scenarios.

use crate::scenario::{
    ActionRef, Assertion, CompareOp, GrievanceConfig, PartConfig, ProtectionConfig, ProxyConfig,
    Scenario,
};
use conclave_core::{BiographyField, DialogueSituation, Dialogues};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// A single part joins the conference and blends
    FirstContact,

    /// A protectee joins while its protector has not consented
    ProtectorExile,

    /// Grievance messages accrue attention and land on their target
    GrievanceClock,

    /// A part surrounded by proxies asks who it sees
    ProxyMaze,

    /// The whole cast: protector, exile, critic and a proxy
    FullHousehold,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::FirstContact,
            ScenarioId::ProtectorExile,
            ScenarioId::GrievanceClock,
            ScenarioId::ProxyMaze,
            ScenarioId::FullHousehold,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::FirstContact => "first_contact",
            ScenarioId::ProtectorExile => "protector_exile",
            ScenarioId::GrievanceClock => "grievance_clock",
            ScenarioId::ProxyMaze => "proxy_maze",
            ScenarioId::FullHousehold => "full_household",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::FirstContact => "One part joins the conference and blends with the subject",
            ScenarioId::ProtectorExile => "An exile joins; its unconsenting protector may lash back",
            ScenarioId::GrievanceClock => "A critic's grievance accrues attention and lands after 10s",
            ScenarioId::ProxyMaze => "A seeker with two proxies asks who it sees",
            ScenarioId::FullHousehold => "Protector, exile, critic and proxy; the walk playground",
        }
    }

    /// Builds the scenario data.
    pub fn scenario(&self) -> Scenario {
        let mut scenario = match self {
            ScenarioId::FirstContact => first_contact(),
            ScenarioId::ProtectorExile => protector_exile(),
            ScenarioId::GrievanceClock => grievance_clock(),
            ScenarioId::ProxyMaze => proxy_maze(),
            ScenarioId::FullHousehold => full_household(),
        };
        scenario.description = Some(self.description().to_string());
        scenario
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "first_contact" | "firstcontact" => Ok(ScenarioId::FirstContact),
            "protector_exile" | "protectorexile" => Ok(ScenarioId::ProtectorExile),
            "grievance_clock" | "grievanceclock" => Ok(ScenarioId::GrievanceClock),
            "proxy_maze" | "proxymaze" => Ok(ScenarioId::ProxyMaze),
            "full_household" | "fullhousehold" | "household" => Ok(ScenarioId::FullHousehold),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

fn id(cloud_id: &str) -> String {
    cloud_id.to_string()
}

fn protection(protector: &str, protectee: &str) -> ProtectionConfig {
    ProtectionConfig {
        protector: id(protector),
        protectee: id(protectee),
    }
}

fn guardian() -> PartConfig {
    PartConfig::new("guardian")
        .named("Guardian")
        .trust(0.5)
        .job("Keeps everyone away from the kid")
        .dialogues(
            Dialogues::new()
                .with_lines(DialogueSituation::Blended, ["Nobody gets close. Not on my watch."])
                .with_lines(DialogueSituation::Deflect, ["That's none of your business."])
                .with_lines(DialogueSituation::AlreadyTold, ["I already told you that."])
                .with_lines(DialogueSituation::Job, ["I stand at the door."])
                .with_lines(DialogueSituation::HelpConsent, ["Fine. Show me you can look after them."])
                .with_lines(DialogueSituation::HelpRefusal, ["Not yet."])
                .with_lines(DialogueSituation::UnburdenedJob, ["I used to guard the door. Now I watch the garden."])
                .with_lines(DialogueSituation::Recognition, ["You see me."]),
        )
}

fn exile() -> PartConfig {
    PartConfig::new("kid")
        .named("Kid")
        .trust(0.4)
        .need_attention(0.3)
        .dialogues(
            Dialogues::new()
                .with_lines(DialogueSituation::Blended, ["It's cold in here."])
                .with_lines(DialogueSituation::Recognition, ["You came back."])
                .with_lines(DialogueSituation::Gratitude, ["Thank you for staying."])
                .with_lines(DialogueSituation::UnburdenedJob, ["I don't have to hide anymore."]),
        )
}

fn first_contact() -> Scenario {
    let mut scenario = Scenario::new("first_contact");
    scenario.parts.push(guardian());
    scenario.actions = vec![
        ActionRef::new("join_conference", "guardian"),
        ActionRef::new("blend", "guardian"),
    ];
    scenario.assertions = vec![
        Assertion::Target { cloud_id: id("guardian"), op: CompareOp::Eq, value: false },
        Assertion::Blended { cloud_id: id("guardian"), op: CompareOp::Eq, value: true },
    ];
    scenario
}

fn protector_exile() -> Scenario {
    let mut scenario = Scenario::new("protector_exile");
    scenario.parts = vec![guardian(), exile()];
    scenario.relationships.protections.push(protection("guardian", "kid"));
    scenario.actions = vec![
        ActionRef::new("join_conference", "kid"),
        ActionRef::new("who_do_you_see", "kid"),
    ];
    scenario.assertions = vec![
        Assertion::Target { cloud_id: id("kid"), op: CompareOp::Eq, value: true },
        Assertion::Victory { op: CompareOp::Eq, value: false },
    ];
    scenario
}

fn grievance_clock() -> Scenario {
    let mut scenario = Scenario::new("grievance_clock");
    scenario.parts = vec![
        PartConfig::new("critic").named("Critic").need_attention(0.1).in_conference(),
        exile().in_conference(),
    ];
    scenario.relationships.grievances.push(GrievanceConfig {
        source: id("critic"),
        targets: vec![id("kid")],
        dialogues: vec![id("You always mess this up."), id("Why can't you be normal?")],
    });
    scenario.actions = vec![ActionRef::wait(10.0), ActionRef::wait(1.0)];
    scenario.assertions = vec![
        Assertion::NeedAttention { cloud_id: id("critic"), op: CompareOp::Eq, value: 0.21 },
        Assertion::Message {
            from: Some(id("critic")),
            to: Some(id("kid")),
            op: CompareOp::Eq,
            value: 1.0,
        },
        Assertion::Trust { cloud_id: id("kid"), op: CompareOp::Lte, value: 0.8 },
    ];
    scenario
}

fn proxy_maze() -> Scenario {
    let mut scenario = Scenario::new("proxy_maze");
    scenario.parts = vec![
        PartConfig::new("seeker").named("Seeker").trust(0.3).in_conference(),
        PartConfig::new("mask").named("Mask"),
        PartConfig::new("mirror").named("Mirror"),
    ];
    scenario.relationships.proxies = vec![
        ProxyConfig { source: id("seeker"), proxy: id("mask") },
        ProxyConfig { source: id("seeker"), proxy: id("mirror") },
    ];
    scenario.actions = vec![ActionRef::new("who_do_you_see", "seeker")];
    scenario.assertions = vec![
        Assertion::Target { cloud_id: id("seeker"), op: CompareOp::Eq, value: true },
        Assertion::Victory { op: CompareOp::Eq, value: false },
    ];
    scenario
}

fn full_household() -> Scenario {
    let mut scenario = Scenario::new("full_household");
    scenario.parts = vec![
        guardian().trust(0.7),
        exile().trust(0.6),
        PartConfig::new("critic").named("Critic").trust(0.3),
        PartConfig::new("mask").named("Mask"),
    ];
    scenario.relationships.protections.push(protection("guardian", "kid"));
    scenario.relationships.grievances.push(GrievanceConfig {
        source: id("critic"),
        targets: vec![id("kid")],
        dialogues: vec![id("Stop whining.")],
    });
    scenario.relationships.proxies.push(ProxyConfig {
        source: id("guardian"),
        proxy: id("mask"),
    });
    scenario.actions = vec![
        ActionRef::new("join_conference", "guardian"),
        ActionRef::new("spawn_ray", "guardian"),
        ActionRef::new("ray_field_select", "guardian").asking(BiographyField::Age),
    ];
    scenario.assertions = vec![
        Assertion::Target { cloud_id: id("guardian"), op: CompareOp::Eq, value: true },
        Assertion::Victory { op: CompareOp::Eq, value: false },
    ];
    scenario
}
