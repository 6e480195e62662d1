// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer registration conversation.
//!
//! A pure state machine: each text reply moves it one step and yields the
//! next prompt. Storage and messaging are left to the caller.

use std::sync::LazyLock;

use dormbite_config::model::CampusConfig;
use dormbite_core::types::{
    Gender, GeoPoint, KeyButton, Language, Markup, RegistrationRecord, UserId,
};
use regex::Regex;

pub const BACK: &str = "Back";
const AMHARIC_LABEL: &str = "አማርኛ";

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z ]+$").unwrap());

static INSTITUTIONAL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(nsr|ex)[/\-_.](\d{3,4})[/\-_.](\d{2})$").unwrap()
});

/// Where the conversation currently waits for input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegStage {
    Language,
    Name,
    InstitutionalId,
    Residence,
    /// Picking a block inside a special area.
    AreaBlock { area: String },
    /// Gender question for areas that split blocks by gender.
    Gender { area: String },
    DormDetail,
    Phone,
}

/// What the caller should do after an input.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationReply {
    /// Send `text` with `markup` and wait for the next input.
    Prompt { text: String, markup: Markup },
    /// All fields collected; persist the record.
    Complete(RegistrationRecord),
    /// The draft was discarded; the user must start over.
    Reset { text: String },
}

/// An in-progress registration for one user.
#[derive(Debug, Clone)]
pub struct Registration {
    user: UserId,
    handle: Option<String>,
    stage: RegStage,
    trail: Vec<RegStage>,
    language: Language,
    name: Option<String>,
    institutional_id: Option<String>,
    block: Option<String>,
    location: Option<GeoPoint>,
    gender: Option<Gender>,
    dorm: Option<String>,
    phone_attempts: u32,
}

impl Registration {
    /// Begins a registration and returns the language prompt.
    pub fn start(user: UserId, handle: Option<String>) -> (Self, RegistrationReply) {
        let reg = Self {
            user,
            handle,
            stage: RegStage::Language,
            trail: Vec::new(),
            language: Language::default(),
            name: None,
            institutional_id: None,
            block: None,
            location: None,
            gender: None,
            dorm: None,
            phone_attempts: 0,
        };
        let reply = reg.prompt(None, &CampusConfig::default());
        (reg, reply)
    }

    pub fn stage(&self) -> &RegStage {
        &self.stage
    }

    pub fn phone_attempts(&self) -> u32 {
        self.phone_attempts
    }

    /// Feeds one text reply into the conversation.
    pub fn handle(
        &mut self,
        input: &str,
        campus: &CampusConfig,
        phone_attempt_limit: u32,
    ) -> RegistrationReply {
        let input = input.trim();

        if input.eq_ignore_ascii_case(BACK) {
            if let Some(previous) = self.trail.pop() {
                self.stage = previous;
            }
            return self.prompt(None, campus);
        }

        match self.stage.clone() {
            RegStage::Language => {
                self.language = if input == AMHARIC_LABEL || input.eq_ignore_ascii_case("amharic")
                {
                    Language::Amharic
                } else if input.eq_ignore_ascii_case("english") {
                    Language::English
                } else {
                    return self.prompt(Some("Please choose a language from the buttons."), campus);
                };
                self.advance(RegStage::Name, campus)
            }
            RegStage::Name => match validate_name(input) {
                Ok(name) => {
                    self.name = Some(name);
                    self.advance(RegStage::InstitutionalId, campus)
                }
                Err(reason) => self.prompt(Some(reason), campus),
            },
            RegStage::InstitutionalId => match normalize_institutional_id(input) {
                Ok(id) => {
                    self.institutional_id = Some(id);
                    self.advance(RegStage::Residence, campus)
                }
                Err(reason) => self.prompt(Some(reason), campus),
            },
            RegStage::Residence => {
                if let Some(area) = campus.special_area(input) {
                    let area_name = area.name.clone();
                    let next = if area.gender_split {
                        RegStage::Gender { area: area_name }
                    } else {
                        RegStage::AreaBlock { area: area_name }
                    };
                    return self.advance(next, campus);
                }
                match campus.block(input) {
                    Some(block) => {
                        self.block = Some(block.name.clone());
                        self.location = block.location();
                        self.gender = None;
                        self.advance(RegStage::DormDetail, campus)
                    }
                    None => self.prompt(Some("Please choose your block from the buttons."), campus),
                }
            }
            RegStage::Gender { area } => {
                self.gender = match input.to_ascii_lowercase().as_str() {
                    "male" => Some(Gender::Male),
                    "female" => Some(Gender::Female),
                    _ => return self.prompt(Some("Please choose 'Male' or 'Female'."), campus),
                };
                self.advance(RegStage::AreaBlock { area }, campus)
            }
            RegStage::AreaBlock { area } => {
                let known = campus
                    .special_area(&area)
                    .is_some_and(|a| a.blocks.iter().any(|b| b == input));
                if !known {
                    return self.prompt(Some("Please choose your block from the buttons."), campus);
                }
                self.block = Some(input.to_string());
                self.location = None;
                self.advance(RegStage::DormDetail, campus)
            }
            RegStage::DormDetail => {
                if input.is_empty() || input.starts_with('/') {
                    return self.prompt(Some("Please enter your dorm number."), campus);
                }
                self.dorm = Some(input.to_string());
                self.phone_attempts = 0;
                self.advance(RegStage::Phone, campus)
            }
            RegStage::Phone => match validate_phone(input) {
                Ok(()) => self.finish(input),
                Err(reason) => {
                    self.phone_attempts += 1;
                    if self.phone_attempts >= phone_attempt_limit {
                        let text = format!(
                            "⚠️ {phone_attempt_limit} invalid attempts. Registration has been reset.\n\
                             Please type /start to try again."
                        );
                        self.discard();
                        return RegistrationReply::Reset { text };
                    }
                    let note = format!(
                        "{reason}\n(Attempt {}/{phone_attempt_limit}). Please try again:",
                        self.phone_attempts
                    );
                    self.prompt(Some(&note), campus)
                }
            },
        }
    }

    fn advance(&mut self, next: RegStage, campus: &CampusConfig) -> RegistrationReply {
        let previous = std::mem::replace(&mut self.stage, next);
        self.trail.push(previous);
        self.prompt(None, campus)
    }

    fn finish(&mut self, phone: &str) -> RegistrationReply {
        let record = RegistrationRecord {
            id: self.user,
            name: self.name.clone().unwrap_or_default(),
            handle: self.handle.clone(),
            institutional_id: self.institutional_id.clone().unwrap_or_default(),
            block: self.block.clone().unwrap_or_default(),
            dorm: self.dorm.clone().unwrap_or_default(),
            phone: phone.to_string(),
            language: self.language,
            gender: self.gender,
            location: self.location,
        };
        RegistrationReply::Complete(record)
    }

    fn discard(&mut self) {
        let user = self.user;
        let handle = self.handle.take();
        *self = Self::start(user, handle).0;
    }

    fn prompt(&self, note: Option<&str>, campus: &CampusConfig) -> RegistrationReply {
        let back_only = || Markup::Keyboard(vec![vec![KeyButton::text(BACK)]]);
        let (body, markup) = match &self.stage {
            RegStage::Language => (
                "Welcome to Dormbite food delivery! Let's get you registered.\n\
                 Please choose your language:"
                    .to_string(),
                Markup::Keyboard(vec![vec![
                    KeyButton::text("English"),
                    KeyButton::text(AMHARIC_LABEL),
                ]]),
            ),
            RegStage::Name => (
                "Please enter your Full Name (FirstName FatherName, as on your ID):".to_string(),
                back_only(),
            ),
            RegStage::InstitutionalId => (
                "Now enter your Student ID (for example nsr/1234/16):".to_string(),
                back_only(),
            ),
            RegStage::Residence => (
                "Please choose your Block (or select a special area):".to_string(),
                residence_keyboard(campus),
            ),
            RegStage::Gender { .. } => (
                "Please select your Gender:".to_string(),
                Markup::Keyboard(vec![
                    vec![KeyButton::text("Male"), KeyButton::text("Female")],
                    vec![KeyButton::text(BACK)],
                ]),
            ),
            RegStage::AreaBlock { area } => {
                let mut rows: Vec<Vec<KeyButton>> = campus
                    .special_area(area)
                    .map(|a| a.blocks.iter().map(|b| vec![KeyButton::text(b)]).collect())
                    .unwrap_or_default();
                rows.push(vec![KeyButton::text(BACK)]);
                (format!("Select your block in {area}:"), Markup::Keyboard(rows))
            }
            RegStage::DormDetail => (
                "Please input accurate information to avoid delivery issues.\n\n\
                 Enter your Dorm Number:"
                    .to_string(),
                back_only(),
            ),
            RegStage::Phone => (
                "Finally, enter your Phone Number (starting with 09, 07, +2519, or +2517):"
                    .to_string(),
                back_only(),
            ),
        };
        let text = match note {
            Some(note) => format!("{note}\n{body}"),
            None => body,
        };
        RegistrationReply::Prompt { text, markup }
    }
}

fn residence_keyboard(campus: &CampusConfig) -> Markup {
    let mut rows = Vec::new();
    if !campus.special_areas.is_empty() {
        rows.push(
            campus
                .special_areas
                .iter()
                .map(|a| KeyButton::text(&a.name))
                .collect(),
        );
    }
    for pair in campus.blocks.chunks(2) {
        rows.push(pair.iter().map(|b| KeyButton::text(&b.name)).collect());
    }
    rows.push(vec![KeyButton::text(BACK)]);
    Markup::Keyboard(rows)
}

/// Letters and spaces, at least two parts, each 3 to 12 letters.
pub fn validate_name(input: &str) -> Result<String, &'static str> {
    if !NAME_RE.is_match(input) {
        return Err("Invalid input: the full name may contain only letters and spaces.");
    }
    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() < 2 {
        return Err("You also need to input your father name, separated by a space.");
    }
    if parts.iter().any(|p| !(3..=12).contains(&p.len())) {
        return Err("Each name part must be at least 3 and at most 12 letters.");
    }
    Ok(parts.join(" "))
}

/// Validates `nsr/1234/16`-style ids and normalizes separators and case.
pub fn normalize_institutional_id(input: &str) -> Result<String, &'static str> {
    let caps = INSTITUTIONAL_ID_RE.captures(input).ok_or(
        "Invalid Student ID format. Use nsr/1234/16 or EX-123-18: prefix 'nsr' or 'ex', \
         3 or 4 digits, then a two-digit year.",
    )?;
    let year: u8 = caps[3]
        .parse()
        .map_err(|_| "The last part must be a two-digit year.")?;
    if !(14..=18).contains(&year) {
        return Err("The last two digits must be between 14 and 18 inclusive.");
    }
    Ok(format!(
        "{}/{}/{}",
        caps[1].to_ascii_lowercase(),
        &caps[2],
        &caps[3]
    ))
}

/// `09`/`07` followed by 8 digits, or `+2519`/`+2517` followed by 8 digits.
pub fn validate_phone(input: &str) -> Result<(), &'static str> {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if input.starts_with("09") || input.starts_with("07") {
        if input.len() == 10 && all_digits(input) {
            return Ok(());
        }
        return Err("❌ Invalid: numbers starting with 09 or 07 must be exactly 10 digits.");
    }
    if input.starts_with("+2519") || input.starts_with("+2517") {
        if input.len() == 13 && all_digits(&input[1..]) {
            return Ok(());
        }
        return Err("❌ Invalid: numbers starting with +251 must be exactly 13 characters.");
    }
    Err("❌ Invalid: number must start with 09, 07, +2519, or +2517.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campus() -> CampusConfig {
        CampusConfig::default()
    }

    fn feed(reg: &mut Registration, inputs: &[&str]) -> RegistrationReply {
        let campus = campus();
        let mut last = None;
        for input in inputs {
            last = Some(reg.handle(input, &campus, 5));
        }
        last.unwrap()
    }

    #[test]
    fn scenario_a_registers_exact_fields() {
        let (mut reg, _) = Registration::start(UserId(1001), Some("abebe_k".into()));
        let reply = feed(
            &mut reg,
            &["English", "Abebe Kebede", "nsr/1234/16", "Block 1", "12", "0911223344"],
        );
        let RegistrationReply::Complete(record) = reply else {
            panic!("expected completion, got {reply:?}");
        };
        assert_eq!(record.name, "Abebe Kebede");
        assert_eq!(record.institutional_id, "nsr/1234/16");
        assert_eq!(record.block, "Block 1");
        assert_eq!(record.dorm, "12");
        assert_eq!(record.phone, "0911223344");
        assert!(record.location.is_some());
    }

    #[test]
    fn fifth_bad_phone_discards_everything() {
        let (mut reg, _) = Registration::start(UserId(1), None);
        feed(&mut reg, &["English", "Abebe Kebede", "nsr/1234/16", "Block 1", "12"]);
        for attempt in 1..=4 {
            let reply = reg.handle("12345", &campus(), 5);
            assert!(matches!(reply, RegistrationReply::Prompt { .. }));
            assert_eq!(reg.phone_attempts(), attempt);
        }
        let reply = reg.handle("12345", &campus(), 5);
        assert!(matches!(reply, RegistrationReply::Reset { .. }));
        assert_eq!(reg.stage(), &RegStage::Language);
        assert_eq!(reg.phone_attempts(), 0);
        assert!(reg.name.is_none());
        assert!(reg.institutional_id.is_none());
    }

    #[test]
    fn back_returns_to_previous_prompt() {
        let (mut reg, _) = Registration::start(UserId(1), None);
        feed(&mut reg, &["English", "Abebe Kebede", "nsr/1234/16"]);
        assert_eq!(reg.stage(), &RegStage::Residence);

        let reply = reg.handle("Back", &campus(), 5);
        assert_eq!(reg.stage(), &RegStage::InstitutionalId);
        let RegistrationReply::Prompt { markup, .. } = reply else {
            panic!("expected prompt");
        };
        assert_eq!(markup.labels(), vec![BACK]);

        reg.handle("back", &campus(), 5);
        assert_eq!(reg.stage(), &RegStage::Name);
    }

    #[test]
    fn gc_area_asks_gender_then_block() {
        let (mut reg, _) = Registration::start(UserId(1), None);
        feed(&mut reg, &["English", "Sara Alemu", "EX-123-18", "Around GC Building"]);
        assert!(matches!(reg.stage(), RegStage::Gender { .. }));

        let reply = reg.handle("Female", &campus(), 5);
        let RegistrationReply::Prompt { markup, .. } = reply else {
            panic!("expected prompt");
        };
        assert!(markup.labels().contains(&"water_block"));

        let RegistrationReply::Complete(record) =
            feed(&mut reg, &["water_block", "7", "+251911223344"])
        else {
            panic!("expected completion");
        };
        assert_eq!(record.gender, Some(Gender::Female));
        assert_eq!(record.block, "water_block");
        assert_eq!(record.institutional_id, "ex/123/18");
    }

    #[test]
    fn back_from_gc_block_reaches_gender() {
        let (mut reg, _) = Registration::start(UserId(1), None);
        feed(
            &mut reg,
            &["English", "Sara Alemu", "EX-123-18", "Around GC Building", "Male"],
        );
        reg.handle(BACK, &campus(), 5);
        assert!(matches!(reg.stage(), RegStage::Gender { .. }));
        reg.handle(BACK, &campus(), 5);
        assert_eq!(reg.stage(), &RegStage::Residence);
    }

    #[test]
    fn names_are_checked() {
        assert!(validate_name("Abebe Kebede").is_ok());
        assert!(validate_name("Abebe").is_err());
        assert!(validate_name("Ab Kebede").is_err());
        assert!(validate_name("Abebe Kebedeeeeeeeee").is_err());
        assert!(validate_name("Abebe K3bede").is_err());
        assert_eq!(validate_name("Abebe   Kebede").unwrap(), "Abebe Kebede");
    }

    #[test]
    fn institutional_ids_are_normalized() {
        assert_eq!(normalize_institutional_id("NSR.1234.16").unwrap(), "nsr/1234/16");
        assert_eq!(normalize_institutional_id("ex_123_14").unwrap(), "ex/123/14");
        assert!(normalize_institutional_id("nsr/1234/19").is_err());
        assert!(normalize_institutional_id("nsr/12/16").is_err());
        assert!(normalize_institutional_id("abc/1234/16").is_err());
    }

    #[test]
    fn phone_shapes() {
        assert!(validate_phone("0911223344").is_ok());
        assert!(validate_phone("0711223344").is_ok());
        assert!(validate_phone("+251911223344").is_ok());
        assert!(validate_phone("+251711223344").is_ok());
        assert!(validate_phone("091122334").is_err());
        assert!(validate_phone("09112233a4").is_err());
        assert!(validate_phone("+25191122334").is_err());
        assert!(validate_phone("0811223344").is_err());
    }
}
