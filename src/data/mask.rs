//! Masking modes of slot data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mask {
    /// Data may or may not be masked.
    Flex,
    /// Data is never masked.
    None,
    /// Fixed mask, `true` marks a masked cell.
    Explicit(Arc<Vec<bool>>),
}

impl Mask {
    pub fn explicit(cells: Vec<bool>) -> Self { Mask::Explicit(Arc::new(cells)) }

    pub fn is_specified(&self) -> bool { matches!(self, Mask::Explicit(_)) }

    /// Whether data produced under `upstream` satisfies the `downstream` requirement.
    ///
    /// `Flex` downstream takes anything, `None` downstream only `None`. An
    /// explicit downstream mask needs an explicit upstream mask of the same
    /// length whose masked cells are all masked downstream as well.
    pub fn compatible(upstream: &Mask, downstream: &Mask) -> bool {
        match (upstream, downstream) {
            (_, Mask::Flex) => true,
            (Mask::None, Mask::None) => true,
            (_, Mask::None) => false,
            (Mask::Explicit(up), Mask::Explicit(down)) => {
                up.len() == down.len() && up.iter().zip(down.iter()).all(|(&u, &d)| !u || d)
            }
            (_, Mask::Explicit(_)) => false,
        }
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mask::Flex => f.write_str("Flex"),
            Mask::None => f.write_str("None"),
            Mask::Explicit(cells) => {
                write!(f, "Explicit({}/{})", cells.iter().filter(|&&c| c).count(), cells.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Mask::Flex, Mask::Flex, true)]
    #[case(Mask::None, Mask::Flex, true)]
    #[case(Mask::explicit(vec![true, false]), Mask::Flex, true)]
    #[case(Mask::None, Mask::None, true)]
    #[case(Mask::Flex, Mask::None, false)]
    #[case(Mask::explicit(vec![true, false]), Mask::None, false)]
    #[case(Mask::explicit(vec![true, false]), Mask::explicit(vec![true, false]), true)]
    #[case(Mask::explicit(vec![true, false]), Mask::explicit(vec![true, true]), true)]
    #[case(Mask::explicit(vec![true, true]), Mask::explicit(vec![true, false]), false)]
    #[case(Mask::explicit(vec![true]), Mask::explicit(vec![true, false]), false)]
    #[case(Mask::None, Mask::explicit(vec![false, false]), false)]
    fn test_mask_rules(#[case] upstream: Mask, #[case] downstream: Mask, #[case] expected: bool) {
        assert_eq!(Mask::compatible(&upstream, &downstream), expected);
    }
}
