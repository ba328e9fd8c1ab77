//! Signer ordering.

use std::collections::{BTreeSet, HashMap};

use crate::chain::types::{ChainEvent, Identity, TxHash};

/// Maps each signer identity to its positions in the caller's signer list.
///
/// Attribution reports a repeated identity by its first position; each match
/// then claims one of that identity's slots through [`SignerOrder::claim`].
#[derive(Debug, Clone, Default)]
pub struct SignerOrder {
    signers: Vec<Identity>,
    slots: HashMap<Identity, Vec<usize>>,
    extrinsics: Vec<Option<TxHash>>,
}

/// A result slot taken by one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClaim {
    /// Position in the caller's signer list.
    pub position: usize,
    /// The slot's recorded extrinsic hash equals the match's.
    pub pinned: bool,
}

impl SignerOrder {
    /// Build the ordering from the caller's signer list.
    pub fn new(signers: Vec<Identity>) -> Self {
        let mut slots: HashMap<Identity, Vec<usize>> = HashMap::with_capacity(signers.len());
        for (index, signer) in signers.iter().enumerate() {
            slots.entry(signer.clone()).or_default().push(index);
        }
        Self {
            signers,
            slots,
            extrinsics: Vec::new(),
        }
    }

    /// Record the extrinsic each position was submitted as, when known.
    pub fn with_extrinsic_hashes(mut self, hashes: Vec<Option<TxHash>>) -> Self {
        self.extrinsics = hashes;
        self
    }

    /// First position of a signer.
    pub fn position(&self, signer: &Identity) -> Option<usize> {
        self.slots.get(signer).and_then(|slots| slots.first().copied())
    }

    /// Every position of a signer, ascending.
    pub fn slots_of(&self, signer: &Identity) -> &[usize] {
        self.slots.get(signer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Extrinsic recorded for a position.
    pub fn extrinsic_hash(&self, position: usize) -> Option<TxHash> {
        self.extrinsics.get(position).copied().flatten()
    }

    /// First position of the lowest-placed signer an event's payload mentions.
    pub fn attribute(&self, event: &ChainEvent) -> Option<usize> {
        self.signers
            .iter()
            .enumerate()
            .find(|(index, signer)| self.position(signer) == Some(*index) && event.mentions(signer))
            .map(|(index, _)| index)
    }

    /// Pick an open slot for a match attributed to the signer at `first`.
    ///
    /// A slot recorded with the match's extrinsic wins. Otherwise the lowest
    /// open slot with no recorded extrinsic, then the lowest open slot.
    pub fn claim(
        &self,
        first: usize,
        extrinsic_hash: Option<TxHash>,
        filled: &BTreeSet<usize>,
    ) -> Option<SlotClaim> {
        let signer = self.signers.get(first)?;
        let open: Vec<usize> = self
            .slots_of(signer)
            .iter()
            .copied()
            .filter(|slot| !filled.contains(slot))
            .collect();

        if let Some(hash) = extrinsic_hash {
            if let Some(&position) = open.iter().find(|&&slot| self.extrinsic_hash(slot) == Some(hash)) {
                return Some(SlotClaim {
                    position,
                    pinned: true,
                });
            }
        }

        open.iter()
            .copied()
            .find(|&slot| self.extrinsic_hash(slot).is_none())
            .or_else(|| open.first().copied())
            .map(|position| SlotClaim {
                position,
                pinned: false,
            })
    }

    /// Signers in caller order.
    pub fn signers(&self) -> &[Identity] {
        &self.signers
    }

    /// Number of signer positions.
    pub fn len(&self) -> usize {
        self.signers.len()
    }

    /// Whether no signers were given.
    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::types::{EventField, Phase};
    use alloy::primitives::B256;

    fn event_mentioning(ids: &[&Identity]) -> ChainEvent {
        ChainEvent {
            section: "identityManagement".into(),
            method: "IdentityCreated".into(),
            data: ids.iter().map(|id| EventField::Value(id.0.clone())).collect(),
            phase: Phase::ApplyExtrinsic(0),
        }
    }

    #[test]
    fn test_positions_follow_caller_order() {
        let a = Identity::from([0xa; 32]);
        let b = Identity::from([0xb; 32]);
        let order = SignerOrder::new(vec![b.clone(), a.clone()]);

        assert_eq!(order.position(&b), Some(0));
        assert_eq!(order.position(&a), Some(1));
        assert_eq!(order.position(&Identity::from([0xc; 32])), None);
    }

    #[test]
    fn test_repeated_signer_attributes_to_first_position() {
        let a = Identity::from([0xa; 32]);
        let b = Identity::from([0xb; 32]);
        let order = SignerOrder::new(vec![a.clone(), b.clone(), a.clone()]);

        assert_eq!(order.len(), 3);
        assert_eq!(order.position(&a), Some(0));
        assert_eq!(order.slots_of(&a), &[0, 2]);
        assert_eq!(order.attribute(&event_mentioning(&[&a])), Some(0));
    }

    #[test]
    fn test_attribute_picks_lowest_mentioned_position() {
        let a = Identity::from([0xa; 32]);
        let b = Identity::from([0xb; 32]);
        let order = SignerOrder::new(vec![a.clone(), b.clone()]);

        assert_eq!(order.attribute(&event_mentioning(&[&b])), Some(1));
        assert_eq!(order.attribute(&event_mentioning(&[&b, &a])), Some(0));
        assert_eq!(order.attribute(&event_mentioning(&[])), None);
    }

    #[test]
    fn test_claim_walks_a_repeated_signers_slots() {
        let a = Identity::from([0xa; 32]);
        let b = Identity::from([0xb; 32]);
        let order = SignerOrder::new(vec![a.clone(), b, a]);
        let mut filled = BTreeSet::new();

        let first = order.claim(0, None, &filled).unwrap();
        assert_eq!(first.position, 0);
        filled.insert(first.position);

        let second = order.claim(0, None, &filled).unwrap();
        assert_eq!(second.position, 2);
        filled.insert(second.position);

        assert_eq!(order.claim(0, None, &filled), None);
    }

    #[test]
    fn test_claim_prefers_the_recorded_extrinsic() {
        let a = Identity::from([0xa; 32]);
        let b = Identity::from([0xb; 32]);
        let early = B256::repeat_byte(1);
        let late = B256::repeat_byte(3);
        let order = SignerOrder::new(vec![a.clone(), b, a])
            .with_extrinsic_hashes(vec![Some(early), Some(B256::repeat_byte(2)), Some(late)]);

        let claim = order.claim(0, Some(late), &BTreeSet::new()).unwrap();
        assert_eq!(claim, SlotClaim { position: 2, pinned: true });

        // An unknown extrinsic still lands in the lowest open slot.
        let claim = order.claim(0, Some(B256::repeat_byte(9)), &BTreeSet::from([2])).unwrap();
        assert_eq!(claim, SlotClaim { position: 0, pinned: false });
    }
}
