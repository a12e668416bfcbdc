//! The shared resource supply.
//!
//! Every resource flow between a player and the supply passes through the
//! bank: production, building costs, bank trades, Year of Plenty, discards.
//! Monopoly moves cards between players directly and never touches it.

use crate::player::{Resource, ResourceBundle};
use serde::{Deserialize, Serialize};

/// Cards of each resource in the supply at game start.
pub const BANK_STOCK_PER_RESOURCE: u32 = 19;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    resources: ResourceBundle,
}

impl Bank {
    /// A full bank: 19 of each resource.
    pub fn new() -> Self {
        let n = BANK_STOCK_PER_RESOURCE;
        Self {
            resources: ResourceBundle::with_amounts(n, n, n, n, n),
        }
    }

    pub fn resources(&self) -> &ResourceBundle {
        &self.resources
    }

    pub fn available(&self, resource: Resource) -> u32 {
        self.resources.get(resource)
    }

    /// Whether the bank can pay out the whole bundle.
    pub fn can_dispense(&self, bundle: &ResourceBundle) -> bool {
        self.resources.covers(bundle)
    }

    /// Pay out a bundle; caller must have checked [`can_dispense`](Self::can_dispense).
    pub fn dispense(&mut self, bundle: &ResourceBundle) {
        self.resources.subtract_bundle(bundle);
    }

    /// Take a bundle back into the supply.
    pub fn receive(&mut self, bundle: &ResourceBundle) {
        self.resources.add_bundle(bundle);
    }
}

impl Default for Bank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_19_of_each() {
        let bank = Bank::new();
        for resource in Resource::ALL {
            assert_eq!(bank.available(resource), 19);
        }
        assert_eq!(bank.resources().total(), 95);
    }

    #[test]
    fn dispense_and_receive() {
        let mut bank = Bank::new();
        let bundle = ResourceBundle::with_amounts(2, 0, 0, 1, 0);

        assert!(bank.can_dispense(&bundle));
        bank.dispense(&bundle);
        assert_eq!(bank.available(Resource::Wood), 17);
        assert_eq!(bank.available(Resource::Wheat), 18);

        bank.receive(&bundle);
        assert_eq!(bank.resources().total(), 95);
    }

    #[test]
    fn cannot_dispense_more_than_stock() {
        let bank = Bank::new();
        assert!(!bank.can_dispense(&ResourceBundle::single(Resource::Ore, 20)));
    }
}
