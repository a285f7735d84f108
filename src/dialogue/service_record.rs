//! Derived fields for the service case: client type, last help year,
//! mood, contact channel and call direction.

use serde::{Deserialize, Serialize};

/// Call direction. Intake is always inbound.
pub const CALL_TYPE_INBOUND: &str = "Inbone";

/// Relationship filed when the caller is the customer.
pub const RELATIONSHIP_SELF: &str = "Cliente";

/// When the office last helped this customer. The backend stores this as a
/// fixed list: the reference year and the six before it, then a single
/// "o antes" option for everything older.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastHelpYear {
    Year(i32),
    /// "2017 o antes".
    OrEarlier(i32),
    Never,
}

impl LastHelpYear {
    /// Number of individually listed years, the reference year included.
    pub const LISTED_YEARS: i32 = 7;

    /// Oldest year with its own option.
    pub fn oldest_listed(reference_year: i32) -> i32 {
        reference_year - (Self::LISTED_YEARS - 1)
    }

    /// Map a stated year onto the listed options.
    pub fn listed(year: i32, reference_year: i32) -> Self {
        if year >= Self::oldest_listed(reference_year) {
            LastHelpYear::Year(year)
        } else {
            LastHelpYear::OrEarlier(Self::oldest_listed(reference_year) - 1)
        }
    }

    /// Value the record backend stores. Never having been helped files as
    /// the "o antes" option.
    pub fn label(&self, reference_year: i32) -> String {
        let or_earlier = Self::oldest_listed(reference_year) - 1;
        match *self {
            LastHelpYear::Year(y) if y >= Self::oldest_listed(reference_year) => y.to_string(),
            LastHelpYear::Year(_) | LastHelpYear::OrEarlier(_) | LastHelpYear::Never => {
                format!("{or_earlier} o antes")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Current,
    Returning,
    New,
}

impl ClientType {
    /// Years before the reference year still counted as current.
    const CURRENT_WINDOW: i32 = 1;
    /// Width of the returning band, immediately before the current band.
    const RETURNING_WINDOW: i32 = 4;

    /// Band the last help year against `reference_year`. A contact created
    /// during this conversation is always new.
    pub fn derive(last_help: LastHelpYear, contact_created: bool, reference_year: i32) -> Self {
        if contact_created {
            return ClientType::New;
        }
        let year = match last_help {
            LastHelpYear::Year(y) | LastHelpYear::OrEarlier(y) => y,
            LastHelpYear::Never => return ClientType::New,
        };
        let age = reference_year - year;
        if age <= Self::CURRENT_WINDOW {
            ClientType::Current
        } else if age <= Self::CURRENT_WINDOW + Self::RETURNING_WINDOW {
            ClientType::Returning
        } else {
            ClientType::New
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Current => "current",
            ClientType::Returning => "returning",
            ClientType::New => "new",
        }
    }

    /// Value the record backend stores.
    pub fn backend_label(&self) -> &'static str {
        match self {
            ClientType::Current => "Cliente Actual",
            ClientType::Returning => "Cliente Retorno",
            ClientType::New => "Cliente Nuevo",
        }
    }
}

/// Contact channel, from the transport that delivered the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactChannel {
    TextMessage,
    Phone,
    InPerson,
}

impl ContactChannel {
    /// The bridge uses the channel name as the session's user id.
    pub fn from_user_id(user_id: &str) -> Self {
        match user_id {
            "sms" => ContactChannel::TextMessage,
            "in_person" => ContactChannel::InPerson,
            _ => ContactChannel::Phone,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContactChannel::TextMessage => "Text message",
            ContactChannel::Phone => "Phone",
            ContactChannel::InPerson => "In person",
        }
    }
}

/// Caller's affect, as recorded on the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mood {
    Enojado,
    Frustrado,
    Desesperado,
    Calmado,
    Feliz,
    Apatico,
    Preocupado,
    Ansioso,
    Agradecido,
    Indeciso,
    Aliviado,
    Impaciente,
    Inseguro,
    Interesado,
    Curioso,
    Avergonzado,
    Resignado,
    Optimista,
}

impl Mood {
    pub fn label(&self) -> &'static str {
        match self {
            Mood::Enojado => "Enojado",
            Mood::Frustrado => "Frustrado",
            Mood::Desesperado => "Desesperado",
            Mood::Calmado => "Calmado",
            Mood::Feliz => "Feliz",
            Mood::Apatico => "Apático",
            Mood::Preocupado => "Preocupado",
            Mood::Ansioso => "Ansioso",
            Mood::Agradecido => "Agradecido",
            Mood::Indeciso => "Indeciso",
            Mood::Aliviado => "Aliviado",
            Mood::Impaciente => "Impaciente",
            Mood::Inseguro => "Inseguro",
            Mood::Interesado => "Interesado",
            Mood::Curioso => "Curioso",
            Mood::Avergonzado => "Avergonzado",
            Mood::Resignado => "Resignado",
            Mood::Optimista => "Optimista",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_type_bands() {
        let derive = |y| ClientType::derive(LastHelpYear::Year(y), false, 2024);
        assert_eq!(derive(2024), ClientType::Current);
        assert_eq!(derive(2023), ClientType::Current);
        assert_eq!(derive(2022), ClientType::Returning);
        assert_eq!(derive(2021), ClientType::Returning);
        assert_eq!(derive(2019), ClientType::Returning);
        assert_eq!(derive(2018), ClientType::New);
        assert_eq!(derive(2017), ClientType::New);
        assert_eq!(derive(2024).as_str(), "current");
        assert_eq!(derive(2021).as_str(), "returning");
        assert_eq!(derive(2017).as_str(), "new");
    }

    #[test]
    fn created_contact_is_always_new() {
        for year in [2024, 2021, 2017] {
            assert_eq!(
                ClientType::derive(LastHelpYear::Year(year), true, 2024),
                ClientType::New
            );
        }
    }

    #[test]
    fn or_earlier_and_never() {
        assert_eq!(
            ClientType::derive(LastHelpYear::OrEarlier(2017), false, 2024),
            ClientType::New
        );
        assert_eq!(
            ClientType::derive(LastHelpYear::Never, false, 2024),
            ClientType::New
        );
        assert_eq!(LastHelpYear::OrEarlier(2017).label(2024), "2017 o antes");
    }

    #[test]
    fn labels_stay_within_listed_options() {
        let listed: Vec<String> = (2018..=2024)
            .map(|y| y.to_string())
            .chain(["2017 o antes".to_string()])
            .collect();
        for year in [
            LastHelpYear::listed(2024, 2024),
            LastHelpYear::listed(2018, 2024),
            LastHelpYear::listed(2017, 2024),
            LastHelpYear::listed(2010, 2024),
            LastHelpYear::Year(2010),
            LastHelpYear::OrEarlier(2012),
            LastHelpYear::Never,
        ] {
            assert!(listed.contains(&year.label(2024)), "{year:?} filed outside the list");
        }
        assert_eq!(LastHelpYear::listed(2010, 2024), LastHelpYear::OrEarlier(2017));
        assert_eq!(LastHelpYear::Never.label(2024), "2017 o antes");
        assert_eq!(LastHelpYear::listed(2020, 2026).label(2026), "2020");
        assert_eq!(LastHelpYear::listed(2019, 2026).label(2026), "2019 o antes");
    }

    #[test]
    fn clamped_years_keep_their_band() {
        assert_eq!(
            ClientType::derive(LastHelpYear::listed(2010, 2024), false, 2024),
            ClientType::New
        );
        assert_eq!(
            ClientType::derive(LastHelpYear::listed(2018, 2024), false, 2024),
            ClientType::New
        );
    }

    #[test]
    fn bands_follow_reference_year() {
        assert_eq!(
            ClientType::derive(LastHelpYear::Year(2024), false, 2026),
            ClientType::Returning
        );
    }

    #[test]
    fn channel_from_user_id() {
        assert_eq!(ContactChannel::from_user_id("sms").label(), "Text message");
        assert_eq!(ContactChannel::from_user_id("voice").label(), "Phone");
        assert_eq!(ContactChannel::from_user_id("anything").label(), "Phone");
    }
}
