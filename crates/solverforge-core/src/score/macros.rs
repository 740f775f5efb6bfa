//! Generates the fixed-level integer score types.
//!
//! Every level is an `i64` field with a semantic label and a textual suffix;
//! the macro derives construction, ordering, arithmetic, formatting and
//! parsing from that single declaration.

macro_rules! level_score {
    (
        $(#[$meta:meta])*
        $name:ident { $($field:ident : $label:ident => $suffix:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            $($field: i64),+
        }

        impl $name {
            pub const ZERO: $name = $name { $($field: 0),+ };

            const LABELS: &'static [$crate::score::ScoreLevel] =
                &[$($crate::score::ScoreLevel::$label),+];
            const SUFFIXES: &'static [&'static str] = &[$($suffix),+];

            #[inline]
            pub const fn of($($field: i64),+) -> Self {
                $name { $($field),+ }
            }

            $(
                #[inline]
                pub const fn $field(&self) -> i64 {
                    self.$field
                }
            )+
        }

        impl $crate::score::Score for $name {
            #[inline]
            fn zero() -> Self {
                $name::ZERO
            }

            #[inline]
            fn levels_count() -> usize {
                Self::LABELS.len()
            }

            fn to_level_numbers(&self) -> Vec<i64> {
                vec![$(self.$field),+]
            }

            fn from_level_numbers(levels: &[i64]) -> Self {
                assert_eq!(
                    levels.len(),
                    Self::LABELS.len(),
                    "{} requires exactly {} levels",
                    stringify!($name),
                    Self::LABELS.len()
                );
                let mut levels = levels.iter().copied();
                $name { $($field: levels.next().unwrap_or(0)),+ }
            }

            fn level_label(index: usize) -> $crate::score::ScoreLevel {
                match Self::LABELS.get(index) {
                    Some(label) => *label,
                    None => panic!(
                        "{} has {} levels, got index {}",
                        stringify!($name),
                        Self::LABELS.len(),
                        index
                    ),
                }
            }

            #[inline]
            fn scaled(&self, factor: i64) -> Self {
                $name { $($field: self.$field.saturating_mul(factor)),+ }
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                ($(self.$field),+).cmp(&($(other.$field),+))
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl std::ops::Add for $name {
            type Output = Self;

            fn add(self, other: Self) -> Self {
                $name { $($field: self.$field.saturating_add(other.$field)),+ }
            }
        }

        impl std::ops::Sub for $name {
            type Output = Self;

            fn sub(self, other: Self) -> Self {
                $name { $($field: self.$field.saturating_sub(other.$field)),+ }
            }
        }

        impl std::ops::Neg for $name {
            type Output = Self;

            fn neg(self) -> Self {
                $name { $($field: self.$field.saturating_neg()),+ }
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut tuple = f.debug_tuple(stringify!($name));
                $(tuple.field(&self.$field);)+
                tuple.finish()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let levels = [$(self.$field),+];
                for (i, (level, suffix)) in levels.iter().zip(Self::SUFFIXES).enumerate() {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    write!(f, "{}{}", level, suffix)?;
                }
                Ok(())
            }
        }

        impl $crate::score::ParseableScore for $name {
            fn parse(s: &str) -> Result<Self, $crate::score::ScoreParseError> {
                let s = s.trim();
                let parts: Vec<&str> = s.split('/').collect();
                if parts.len() != Self::SUFFIXES.len() {
                    return Err($crate::score::ScoreParseError::new(format!(
                        "invalid {} '{}': expected {} parts separated by '/'",
                        stringify!($name),
                        s,
                        Self::SUFFIXES.len()
                    )));
                }
                let mut levels = Vec::with_capacity(parts.len());
                for (part, suffix) in parts.iter().zip(Self::SUFFIXES) {
                    let part = part.trim();
                    let number = part.strip_suffix(suffix).ok_or_else(|| {
                        $crate::score::ScoreParseError::new(format!(
                            "level '{}' must end with '{}'",
                            part, suffix
                        ))
                    })?;
                    let value = number.parse::<i64>().map_err(|e| {
                        $crate::score::ScoreParseError::new(format!(
                            "invalid level '{}': {}",
                            number, e
                        ))
                    })?;
                    levels.push(value);
                }
                Ok(<$name as $crate::score::Score>::from_level_numbers(&levels))
            }
        }
    };
}
