//! Participants of the protocol, the key material they hold and who talks to whom.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    message::SecurityOptions,
    replay::{Chapter, Position, Step},
};

/// A party taking part in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Participant {
    /// Orchestrates the turns and holds the permutation.
    Controller,
    /// Selects the arm from the (shuffled) scores.
    Comp,
    /// The data owner behind one arm.
    DataOwner(usize),
    /// Receives the cumulative reward.
    DataCustomer,
}

impl Participant {
    /// Returns `true` for data owners.
    pub fn is_data_owner(&self) -> bool {
        matches!(self, Participant::DataOwner(_))
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Controller => f.write_str("Controller"),
            Participant::Comp => f.write_str("Comp"),
            Participant::DataOwner(arm) => write!(f, "DO{arm}"),
            Participant::DataCustomer => f.write_str("DC"),
        }
    }
}

/// Secret or public material held by a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyMaterial {
    /// Symmetric key shared by data owners and Comp.
    AesKey,
    /// The Controller's permutation.
    Permutation,
    /// The data owners' score mask.
    Mask,
    /// Public key of the homomorphic scheme.
    PaillierPublicKey,
    /// Secret key of the homomorphic scheme, held by the customer only.
    PaillierSecretKey,
}

impl fmt::Display for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyMaterial::AesKey => "AESKey",
            KeyMaterial::Permutation => "Perm",
            KeyMaterial::Mask => "Mask",
            KeyMaterial::PaillierPublicKey => "PaillierPK",
            KeyMaterial::PaillierSecretKey => "PaillierSK",
        })
    }
}

/// The key material `participant` holds under the given options.
pub fn known_keys(
    participant: Participant,
    secure: bool,
    options: SecurityOptions,
) -> Vec<KeyMaterial> {
    let mut keys = vec![];
    if !secure {
        return keys;
    }
    let owner = participant.is_data_owner();
    if options.aes && (owner || participant == Participant::Comp) {
        keys.push(KeyMaterial::AesKey);
    }
    if options.permutation && participant == Participant::Controller {
        keys.push(KeyMaterial::Permutation);
    }
    if options.mask && owner {
        keys.push(KeyMaterial::Mask);
    }
    if options.paillier {
        if owner {
            keys.push(KeyMaterial::PaillierPublicKey);
        }
        if participant == Participant::DataCustomer {
            keys.push(KeyMaterial::PaillierPublicKey);
            keys.push(KeyMaterial::PaillierSecretKey);
        }
    }
    keys
}

/// Formats key material as a comma separated list, e.g. `AESKey, Mask`.
pub fn describe_keys(keys: &[KeyMaterial]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The sender and receiver of the message exchanged at a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Communication {
    /// The step of the exchange.
    pub step: Step,
    /// The sending party.
    pub from: Participant,
    /// The receiving party.
    pub to: Participant,
}

impl Communication {
    /// The exchange at `step`, seen from the data owner `focused_arm`.
    pub fn at(step: Step, focused_arm: usize) -> Communication {
        let owner = Participant::DataOwner(focused_arm);
        let (from, to) = match step {
            Step::Step2 | Step::Step6 => (owner, Participant::Controller),
            Step::Step3 => (Participant::Controller, Participant::Comp),
            Step::Step4 => (Participant::Comp, Participant::Controller),
            Step::Step5 => (Participant::Controller, owner),
            Step::Step7 => (Participant::Controller, Participant::DataCustomer),
        };
        Communication { step, from, to }
    }
}

/// The exchanges listed while the replay is in `chapter`.
///
/// Main loop exchanges are listed until the aggregation starts, after which only the aggregation
/// exchanges are.
pub fn visible_communications(chapter: Chapter, focused_arm: usize) -> Vec<Communication> {
    let aggregating = chapter == Chapter::CumulativeRewardComputation;
    Step::ALL
        .iter()
        .filter(|step| (step.chapter() == Chapter::CumulativeRewardComputation) == aggregating)
        .map(|&step| Communication::at(step, focused_arm))
        .collect()
}

/// The links active in the architecture at `position`.
pub fn edges(position: &Position, arm_count: usize) -> Vec<(Participant, Participant)> {
    let owners = (0..arm_count).map(Participant::DataOwner);
    match position.step() {
        None => vec![],
        Some(Step::Step2 | Step::Step6) => owners.map(|o| (o, Participant::Controller)).collect(),
        Some(Step::Step5) => owners.map(|o| (Participant::Controller, o)).collect(),
        Some(Step::Step3) => vec![(Participant::Controller, Participant::Comp)],
        Some(Step::Step4) => vec![(Participant::Comp, Participant::Controller)],
        Some(Step::Step7) => vec![(Participant::Controller, Participant::DataCustomer)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::CoreStep;

    #[test]
    fn test_known_keys() {
        let all = SecurityOptions::all();
        assert_eq!(
            describe_keys(&known_keys(Participant::DataOwner(1), true, all)),
            "AESKey, Mask, PaillierPK"
        );
        assert_eq!(
            known_keys(Participant::Controller, true, all),
            vec![KeyMaterial::Permutation]
        );
        assert_eq!(
            describe_keys(&known_keys(Participant::DataCustomer, true, all)),
            "PaillierPK, PaillierSK"
        );
        assert!(known_keys(Participant::Comp, false, all).is_empty());
        assert!(known_keys(Participant::Controller, true, SecurityOptions::none()).is_empty());
    }

    #[test]
    fn test_edges() {
        assert!(edges(&Position::InitialExploration, 3).is_empty());
        let upload = edges(
            &Position::Core {
                turn_index: 3,
                step: CoreStep::Step2,
            },
            3,
        );
        assert_eq!(upload.len(), 3);
        assert_eq!(
            upload[2],
            (Participant::DataOwner(2), Participant::Controller)
        );
    }

    #[test]
    fn test_visible_communications() {
        let core = visible_communications(Chapter::CoreOfProtocol, 0);
        assert_eq!(core.len(), 4);
        assert_eq!(core[0].from, Participant::DataOwner(0));
        let aggregation = visible_communications(Chapter::CumulativeRewardComputation, 2);
        assert_eq!(
            aggregation.iter().map(|c| c.step).collect::<Vec<_>>(),
            vec![Step::Step6, Step::Step7]
        );
        assert_eq!(aggregation[1].to, Participant::DataCustomer);
    }
}
