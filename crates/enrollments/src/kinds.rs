//! Closed vocabularies used by the enrollment aggregate.
//!
//! Wire spellings are the ones persisted and exchanged over JSON; they are
//! matched exactly (case and accents included).

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ModelError::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    Gender {
        Male => "Masculino",
        Female => "Femenino",
        Other => "Otro",
    }
}

wire_enum! {
    /// Not unique per student: both a mother and a father may be registered.
    ParentType {
        Mother => "MADRE",
        Father => "PADRE",
    }
}

wire_enum! {
    HouseholdHead {
        Father => "PADRE",
        Mother => "MADRE",
        Both => "AMBOS",
        MaternalGrandparents => "ABUELOS MAT",
        PaternalGrandparents => "ABUELOS PAT",
        Others => "OTROS",
    }
}

wire_enum! {
    /// Monthly household income bracket (CLP).
    MonthlyIncome {
        Below100k => "Menos de $100.000",
        From100kTo200k => "Entre $100.000 y $200.000",
        From200kTo300k => "Entre $200.001 y $300.000",
        From300kTo400k => "Entre $300.001 y $400.000",
        From400kTo600k => "Entre $400.001 y $600.000",
        Above600k => "Más de $600.000",
    }
}

wire_enum! {
    HousingType {
        Owned => "PROPIA",
        Rented => "ARRENDADA",
        Lodged => "ALLEGADO",
    }
}

wire_enum! {
    /// Priority attached to one of the enrollment's "requires X" flags.
    Priority {
        High => "ALTA",
        Low => "BAJA",
    }
}

wire_enum! {
    EnrollmentStatus {
        Active => "ACTIVA",
        Withdrawn => "RETIRADO",
        Cancelled => "CANCELADA",
    }
}

impl Default for EnrollmentStatus {
    fn default() -> Self {
        EnrollmentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_spellings_round_trip_through_from_str() {
        for income in MonthlyIncome::ALL {
            assert_eq!(income.as_str().parse::<MonthlyIncome>().unwrap(), *income);
        }
        for head in HouseholdHead::ALL {
            assert_eq!(head.as_str().parse::<HouseholdHead>().unwrap(), *head);
        }
    }

    #[test]
    fn serde_uses_wire_spellings() {
        assert_eq!(
            serde_json::to_string(&HouseholdHead::MaternalGrandparents).unwrap(),
            "\"ABUELOS MAT\""
        );
        let income: MonthlyIncome = serde_json::from_str("\"Más de $600.000\"").unwrap();
        assert_eq!(income, MonthlyIncome::Above600k);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let err = "madre".parse::<ParentType>().unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownVariant {
                kind: "ParentType",
                value: "madre".to_string()
            }
        );
    }

    #[test]
    fn status_defaults_to_active() {
        assert_eq!(EnrollmentStatus::default(), EnrollmentStatus::Active);
    }
}
