//! Programmable transaction plans handed to the signer.
//!
//! The bot never serializes BCS itself: it describes what to do as a list of
//! commands and the signing service turns that into a signed transaction block.

use serde::{Deserialize, Serialize};

pub const GAS_BUDGET: u64 = 50_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Argument {
    GasCoin,
    Object(String),
    /// Pure value serialized as a decimal string (u64/u128) or address.
    Pure(String),
    Address(String),
    /// Output of an earlier command.
    Result(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
    MergeCoins {
        destination: Argument,
        sources: Vec<Argument>,
    },
    MoveCall {
        target: String,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammableTransaction {
    pub commands: Vec<Command>,
    pub gas_budget: u64,
}

impl Default for ProgrammableTransaction {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            gas_budget: GAS_BUDGET,
        }
    }
}

impl ProgrammableTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command and returns a handle to its result.
    pub fn push(&mut self, command: Command) -> Argument {
        self.commands.push(command);
        Argument::Result((self.commands.len() - 1) as u16)
    }

    pub fn split_coins(&mut self, coin: Argument, amount: u128) -> Argument {
        self.push(Command::SplitCoins {
            coin,
            amounts: vec![Argument::Pure(amount.to_string())],
        })
    }

    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) -> Argument {
        self.push(Command::MergeCoins { destination, sources })
    }

    pub fn move_call(
        &mut self,
        target: &str,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    ) -> Argument {
        self.push(Command::MoveCall {
            target: target.to_string(),
            type_arguments,
            arguments,
        })
    }

    #[cfg(test)]
    pub fn is_merge_only(&self) -> bool {
        !self.commands.is_empty()
            && self
                .commands
                .iter()
                .all(|c| matches!(c, Command::MergeCoins { .. }))
    }

    /// Target of the first Move call, if any.
    #[cfg(test)]
    pub fn move_target(&self) -> Option<&str> {
        self.commands.iter().find_map(|c| match c {
            Command::MoveCall { target, .. } => Some(target.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_results_are_indexed() {
        let mut tx = ProgrammableTransaction::new();
        let coin = tx.split_coins(Argument::GasCoin, 1_000);
        assert_eq!(coin, Argument::Result(0));

        let out = tx.move_call("0x1::meme::buy", vec!["0x2::frog::FROG".into()], vec![coin]);
        assert_eq!(out, Argument::Result(1));
        assert_eq!(tx.move_target(), Some("0x1::meme::buy"));
        assert!(!tx.is_merge_only());
        assert_eq!(tx.gas_budget, GAS_BUDGET);
    }

    #[test]
    fn test_plan_wire_shape() {
        let mut tx = ProgrammableTransaction::new();
        tx.merge_coins(Argument::Object("0xa".into()), vec![Argument::Object("0xb".into())]);
        assert!(tx.is_merge_only());

        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(
            value,
            json!({
                "commands": [{
                    "command": "MergeCoins",
                    "destination": {"kind": "Object", "value": "0xa"},
                    "sources": [{"kind": "Object", "value": "0xb"}]
                }],
                "gas_budget": 50_000_000
            })
        );
    }
}
