use std::fmt;
use std::str::FromStr;

/// Optional behaviour switches, written as a comma-separated list, eg. `source-cc,plain-puts`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// `ADD` sets the condition code from its first source register instead of the
    /// destination register.
    pub source_cc: bool,
    /// `PUTS` and `PUTSP` leave the program counter untouched.
    pub plain_puts: bool,
}

impl FromStr for Features {
    type Err = String;
    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let mut features = Self::default();
        for word in string.split(',').map(str::trim) {
            let value = match word {
                "" => continue,
                "source-cc" => &mut features.source_cc,
                "plain-puts" => &mut features.plain_puts,
                _ => return Err(format!("Unknown feature '{}'", word)),
            };
            if *value {
                return Err(format!("Cannot specify feature '{}' twice", word));
            }
            *value = true;
        }
        Ok(features)
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let features = [("source-cc", self.source_cc), ("plain-puts", self.plain_puts)];
        let mut has_any_feature = false;
        for (name, value) in features {
            if !value {
                continue;
            }
            if has_any_feature {
                write!(f, ",")?;
            }
            write!(f, "{}", name)?;
            has_any_feature = true;
        }
        Ok(())
    }
}
