//! Built-in melodies

use super::rtttl::{Melody, RtttlError};

pub const BOOT_MELODY: &str = "tronboot:d=16,o=5,b=160:c,16p,g,16p,c6,16p,b,8a";
pub const TOUCH_MELODY: &str = "coin:d=16,o=5,b=600:b5,e6";
pub const POKE_MELODY: &str = "poke:d=16,o=5,b=200:c6,e6,g6,c7";
pub const CLAIM_MELODY: &str = "claim:d=8,o=5,b=180:e,g,b";
pub const MUTE_MELODY: &str = "mute:d=16,o=5,b=200:g5,c5";
pub const UNMUTE_MELODY: &str = "unmute:d=16,o=5,b=200:c5,g5";

/// Which built-in melody to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tune {
    Boot,
    /// Touch feedback and animation switch
    Touch,
    Poke,
    Claim,
    Mute,
    Unmute,
}

impl Tune {
    pub fn text(&self) -> &'static str {
        match self {
            Tune::Boot => BOOT_MELODY,
            Tune::Touch => TOUCH_MELODY,
            Tune::Poke => POKE_MELODY,
            Tune::Claim => CLAIM_MELODY,
            Tune::Mute => MUTE_MELODY,
            Tune::Unmute => UNMUTE_MELODY,
        }
    }

    pub fn melody(&self) -> Result<Melody<'static>, RtttlError> {
        Melody::parse(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_parse() {
        for tune in [Tune::Boot, Tune::Touch, Tune::Poke, Tune::Claim, Tune::Mute, Tune::Unmute] {
            assert!(tune.melody().is_ok(), "{:?}", tune);
        }
    }

    #[test]
    fn test_boot_melody_length() {
        let notes = Tune::Boot.melody().unwrap().count();
        assert_eq!(notes, 8);
    }
}
