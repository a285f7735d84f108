//! Utterance interpretation: who is speaking, who they are calling about,
//! and what they want.
//!
//! `UtteranceInterpreter` is the seam for a language-understanding
//! backend. `RuleInterpreter` is the built-in implementation, driven by
//! Spanish cue phrases ("soy…", "llamo por…", "mi madre, …").

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::service_record::{LastHelpYear, Mood};

/// What the caller wants, independent of any names mentioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    NewCustomer,
    Representative,
    CreateAccount,
    InformationOnly,
    Affirm,
    Deny,
}

/// Structured reading of one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpretation {
    /// Name the speaker gives for themselves ("soy…", "me llamo…").
    pub speaker_name: Option<String>,
    /// Name of the person the speaker is calling about.
    pub third_party_name: Option<String>,
    /// Speaker's relationship to that person ("contador", "hija").
    pub relationship: Option<String>,
    /// The utterance is nothing but a name.
    pub bare_name: Option<String>,
    pub intents: HashSet<Intent>,
}

impl Interpretation {
    pub fn has(&self, intent: Intent) -> bool {
        self.intents.contains(&intent)
    }

    /// The speaker is acting for someone else.
    pub fn speaks_for_someone_else(&self) -> bool {
        self.third_party_name.is_some()
            || self.relationship.is_some()
            || self.has(Intent::Representative)
    }

    /// Any name at all was found.
    pub fn mentions_a_name(&self) -> bool {
        self.speaker_name.is_some() || self.third_party_name.is_some() || self.bare_name.is_some()
    }
}

#[async_trait]
pub trait UtteranceInterpreter: Send + Sync {
    async fn interpret(&self, text: &str) -> Interpretation;

    /// Last year the office helped this customer, if the answer names one.
    async fn last_help_year(&self, text: &str, reference_year: i32) -> Option<LastHelpYear>;

    async fn mood(&self, text: &str) -> Mood;
}

const MAX_NAME_WORDS: usize = 5;

const RELATIONSHIPS: &[&str] = &[
    "madre", "padre", "mamá", "papá", "mama", "papa", "hijo", "hija", "esposo", "esposa",
    "marido", "hermano", "hermana", "abuelo", "abuela", "nieto", "nieta", "tío", "tía", "tio",
    "tia", "primo", "prima", "suegro", "suegra", "sobrino", "sobrina", "cuñado", "cuñada",
    "yerno", "nuera", "novio", "novia", "amigo", "amiga", "vecino", "vecina", "contador",
    "contadora", "asistente", "representante", "cuidador", "cuidadora", "abogado", "abogada",
    "jefe", "jefa", "tutor", "tutora", "socio", "socia",
];

const TITLES: &[&str] = &[
    "señor", "señora", "señorita", "senor", "senora", "sr", "sra", "srta", "don", "doña", "dona",
];

const CONNECTORS: &[&str] = &["de", "del", "la", "las", "los"];

const STOPWORDS: &[&str] = &[
    "y", "e", "o", "u", "a", "al", "de", "del", "la", "el", "los", "las", "lo", "le", "les", "me",
    "mi", "mis", "tu", "su", "sus", "se", "que", "qué", "con", "sin", "en", "por", "para",
    "sobre", "desde", "hasta", "un", "una", "unos", "unas", "es", "son", "soy", "era", "fue",
    "estoy", "está", "esta", "este", "esto", "llamo", "llamando", "llamada", "llama", "hablo",
    "habla", "quiero", "quisiera", "necesito", "tengo", "tiene", "hay", "puedo", "puede",
    "hola", "buenos", "buenas", "días", "dias", "tardes", "noches", "gracias", "favor", "no",
    "sí", "si", "ok", "okay", "bueno", "claro", "nombre", "apellido", "apellidos", "cliente",
    "clienta", "nuevo", "nueva", "cuenta", "información", "informacion", "ayuda", "pregunta",
    "consulta", "parte", "usted", "yo", "él", "ella", "aquí", "aqui", "ahora", "muy", "más",
    "mas", "pero", "porque", "también", "tambien", "español", "inglés", "ingles", "otra",
    "otro", "persona", "impuestos", "como", "cómo", "cuando", "cuándo", "donde", "dónde",
    "estamos", "ayudando", "apoyando", "representando", "asistiendo", "nada", "bien",
    "perdón", "perdon", "disculpe", "mire", "oiga", "pues", "entonces", "ya",
];

/// Leading filler skipped before a bare name ("hola, es Ana Pérez").
const FILLER: &[&str] = &[
    "hola", "buenos", "buenas", "días", "dias", "tardes", "noches", "sí", "si", "claro", "pues",
    "es", "se", "llama", "ok", "bueno", "ah", "eh", "este", "mmm", "perdón", "perdon", "mire",
];

static RELATIONSHIP_ALT: LazyLock<String> = LazyLock::new(|| {
    let mut words: Vec<&str> = RELATIONSHIPS.to_vec();
    words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    words.join("|")
});

static SELF_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:quien habla es|mi nombre es|me llamo|le saluda|le habla|habla|soy)\s+")
        .expect("valid self cue regex")
});

static THIRD_PARTY_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:llamo|llamando|llamada|aqu[ií]|hablo|pregunto)\s+(?:por|para|sobre)|en nombre de|de parte de|por parte de|acerca de|sobre|(?:ayudando|apoyando|representando|asistiendo|ayudar)\s+a)\s+",
    )
    .expect("valid third party cue regex")
});

/// "mi madre, Teresa Gómez" / "hija de Teresa Gómez".
static RELATIONSHIP_NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})(?:\s*,\s*|\s+del?\s+|\s+)", *RELATIONSHIP_ALT))
        .expect("valid named relationship regex")
});

static RELATIONSHIP_ANY: LazyLock<Regex> = LazyLock::new(|| {
    let alt = &*RELATIONSHIP_ALT;
    Regex::new(&format!(
        r"(?i)\b(?:(?:mi|su|el|la|soy)\s+({alt})\b|({alt})\s+del?\b)"
    ))
    .expect("valid relationship regex")
});

static NEW_CUSTOMER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:nuev[oa]s?|primera vez|no soy cliente|no tengo (?:una )?cuenta)\b")
        .expect("valid new customer regex")
});

static REPRESENTATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:represent\w*|en nombre de|de parte de|por parte de|otra persona|llamo por|llamando por|estoy ayudando)\b",
    )
    .expect("valid representative regex")
});

static CREATE_ACCOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:crear|abrir|hacer)\w*\s+(?:(?:una|la|mi)\s+)?cuenta\b|\bregistrarme\b|\bcrearla\b|\bcuenta nueva\b",
    )
    .expect("valid create account regex")
});

static INFORMATION_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:informaci[oó]n|informarme|s[oó]lo (?:quiero|necesito) saber|s[oó]lo pregunt\w*)\b",
    )
    .expect("valid information regex")
});

static AFFIRM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\W*(?:s[ií]|claro|correcto|exacto|as[ií] es|por supuesto|ok|okay|de acuerdo|dale|perfecto)\b",
    )
    .expect("valid affirm regex")
});

static DENY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\W*no\b|\bno (?:quiero|voy a|le voy|deseo)\b|\bprefiero no\b")
        .expect("valid deny regex")
});

static FOUR_DIGIT_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(19\d{2}|20\d{2})\b")
        .expect("valid year regex")
});

static NEVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:nunca|ninguno|primera vez|no me han ayudado)\b").expect("valid never regex")
});

static LAST_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:el )?año pasado\b").expect("valid last year regex")
});

static THIS_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\beste año\b").expect("valid this year regex"));

/// Mood cues, most specific first.
static MOOD_CUES: LazyLock<Vec<(Regex, Mood)>> = LazyLock::new(|| {
    [
        (r"enojad|furios|molest", Mood::Enojado),
        (r"frustrad|harto|harta|otra vez lo mismo", Mood::Frustrado),
        (r"desesperad|urgente|urgencia", Mood::Desesperado),
        (r"impacien|apurad|prisa|r[aá]pido", Mood::Impaciente),
        (r"preocupad|me preocupa", Mood::Preocupado),
        (r"ansios|nervios", Mood::Ansioso),
        (r"avergonz|pena", Mood::Avergonzado),
        (r"no s[eé]|no estoy segur|indecis", Mood::Indeciso),
        (r"insegur|confundid", Mood::Inseguro),
        (r"aliviad|qu[eé] bueno", Mood::Aliviado),
        (r"resignad|ni modo", Mood::Resignado),
        (r"agradec|muchas gracias|mil gracias", Mood::Agradecido),
        (r"feliz|content|excelente|genial", Mood::Feliz),
        (r"optimista|seguro que", Mood::Optimista),
        (r"me interesa|interesad", Mood::Interesado),
        (r"curios|quisiera saber|me pregunto", Mood::Curioso),
        (r"igual|me da lo mismo", Mood::Apatico),
    ]
    .into_iter()
    .map(|(pattern, mood)| {
        (
            Regex::new(&format!(r"(?i)\b(?:{pattern})")).expect("valid mood regex"),
            mood,
        )
    })
    .collect()
});

fn normalize(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn is_in(list: &[&str], word: &str) -> bool {
    list.contains(&normalize(word).as_str())
}

fn ends_clause(raw: &str) -> bool {
    raw.ends_with([',', '.', ';', ':', '!', '?'])
}

fn starts_uppercase(word: &str) -> bool {
    word.trim_start_matches(|c: char| !c.is_alphabetic())
        .chars()
        .next()
        .is_some_and(char::is_uppercase)
}

/// Capitalize an all-lowercase word; leave mixed case alone.
fn tidy(word: &str) -> String {
    let word = word.trim_matches(|c: char| !c.is_alphabetic());
    if word.chars().any(char::is_uppercase) {
        return word.to_string();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct NameScan {
    name: String,
    consumed: usize,
    total: usize,
}

/// Read a name from the start of `tail`, skipping a leading title
/// ("la señora"). Stops at punctuation, a function word, or after
/// `MAX_NAME_WORDS` words.
fn scan_name(tail: &str) -> Option<NameScan> {
    let words: Vec<&str> = tail.split_whitespace().collect();
    let mut i = 0;

    if i + 1 < words.len() && is_in(&["la", "el"], words[i]) && is_in(TITLES, words[i + 1]) {
        i += 1;
    }
    if i < words.len() && is_in(TITLES, words[i]) {
        if ends_clause(words[i]) {
            return None;
        }
        i += 1;
    }

    let mut parts: Vec<String> = Vec::new();
    while i < words.len() && parts.len() < MAX_NAME_WORDS {
        let raw = words[i];
        let lower = normalize(raw);
        if lower.is_empty() || lower.chars().any(|c| c.is_ascii_digit()) {
            break;
        }

        if !parts.is_empty() && CONNECTORS.contains(&lower.as_str()) && !ends_clause(raw) {
            // "María de la Cruz": connectors only between capitalized words.
            let mut j = i;
            while j < words.len() && j - i < 2 && is_in(CONNECTORS, words[j]) && !ends_clause(words[j]) {
                j += 1;
            }
            if j < words.len() && starts_uppercase(words[j]) && !is_in(STOPWORDS, words[j]) {
                parts.extend(words[i..j].iter().map(|w| normalize(w)));
                i = j;
                continue;
            }
            break;
        }

        if STOPWORDS.contains(&lower.as_str())
            || RELATIONSHIPS.contains(&lower.as_str())
            || TITLES.contains(&lower.as_str())
        {
            break;
        }

        parts.push(tidy(raw));
        i += 1;
        if ends_clause(raw) {
            break;
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(NameScan {
        name: parts.join(" "),
        consumed: i,
        total: words.len(),
    })
}

/// First name found right after any match of `cue`, trying later matches
/// (including overlapping ones) when an earlier one yields nothing.
fn name_after(cue: &Regex, text: &str) -> Option<String> {
    let mut start = 0;
    while start <= text.len() {
        let m = cue.find_at(text, start)?;
        if let Some(scan) = scan_name(&text[m.end()..]) {
            return Some(scan.name);
        }
        start = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

fn relationship_in(text: &str) -> Option<String> {
    let caps = RELATIONSHIP_ANY.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_lowercase())
}

/// The utterance is only a name, possibly after greeting filler.
fn bare_name(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let skip = words.iter().take_while(|w| is_in(FILLER, w)).count();
    let rest = words[skip..].join(" ");
    let scan = scan_name(&rest)?;
    let trailing_ok = rest
        .split_whitespace()
        .skip(scan.consumed)
        .all(|w| is_in(&["gracias", "por", "favor"], w));
    (scan.consumed == scan.total || trailing_ok).then_some(scan.name)
}

/// Cue-phrase interpreter for Spanish callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleInterpreter;

impl RuleInterpreter {
    pub fn new() -> Self {
        Self
    }

    pub fn interpret_text(&self, text: &str) -> Interpretation {
        let mut out = Interpretation {
            speaker_name: name_after(&SELF_CUE, text),
            third_party_name: name_after(&THIRD_PARTY_CUE, text)
                .or_else(|| name_after(&RELATIONSHIP_NAMED, text)),
            relationship: relationship_in(text),
            ..Default::default()
        };

        // A name given as "soy X" that is also the third party was a false cue.
        if out.speaker_name.is_some() && out.speaker_name == out.third_party_name {
            out.speaker_name = None;
        }

        let cues: [(&Regex, Intent); 6] = [
            (&*NEW_CUSTOMER, Intent::NewCustomer),
            (&*REPRESENTATIVE, Intent::Representative),
            (&*CREATE_ACCOUNT, Intent::CreateAccount),
            (&*INFORMATION_ONLY, Intent::InformationOnly),
            (&*AFFIRM, Intent::Affirm),
            (&*DENY, Intent::Deny),
        ];
        out.intents = cues
            .into_iter()
            .filter(|(re, _)| re.is_match(text))
            .map(|(_, intent)| intent)
            .collect();

        if out.speaker_name.is_none() && out.third_party_name.is_none() {
            out.bare_name = bare_name(text);
        }
        out
    }

    pub fn last_help_year_text(&self, text: &str, reference_year: i32) -> Option<LastHelpYear> {
        if let Some(caps) = FOUR_DIGIT_YEAR.captures(text) {
            let year: i32 = caps[1].parse().ok()?;
            if year > reference_year {
                return None;
            }
            return Some(LastHelpYear::listed(year, reference_year));
        }
        if NEVER.is_match(text) {
            return Some(LastHelpYear::Never);
        }
        if LAST_YEAR.is_match(text) {
            return Some(LastHelpYear::Year(reference_year - 1));
        }
        if THIS_YEAR.is_match(text) {
            return Some(LastHelpYear::Year(reference_year));
        }
        None
    }

    pub fn mood_text(&self, text: &str) -> Mood {
        MOOD_CUES
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, mood)| *mood)
            .unwrap_or(Mood::Calmado)
    }
}

#[async_trait]
impl UtteranceInterpreter for RuleInterpreter {
    async fn interpret(&self, text: &str) -> Interpretation {
        self.interpret_text(text)
    }

    async fn last_help_year(&self, text: &str, reference_year: i32) -> Option<LastHelpYear> {
        self.last_help_year_text(text, reference_year)
    }

    async fn mood(&self, text: &str) -> Mood {
        self.mood_text(text)
    }
}
