use std::collections::HashSet;

use chrono::{Days, Months, NaiveDate};
use rand::Rng;

use schoolseed_core::{NewUser, PersonalData, Role};

use crate::errors::GenerationError;
use crate::locale;

/// Credentials handed out to synthetic accounts.
///
/// Every seeded user shares one bcrypt digest so downstream test suites can
/// log in with a known password. This type is the only place that digest
/// lives; production registration never goes through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureCredential;

impl FixtureCredential {
    /// bcrypt (cost 12) of [`FixtureCredential::PLAIN_PASSWORD`].
    pub const PASSWORD_HASH: &'static str =
        "$2b$12$RRSdGpNPikVY/TjNRCcEJ.gG8aqZR4cqY.afGGBblmQp.tB0tpoh6";
    pub const PLAIN_PASSWORD: &'static str = "admin";

    pub fn password_hash(self) -> &'static str {
        Self::PASSWORD_HASH
    }
}

/// Inclusive age bounds, in whole years, at the reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

impl AgeRange {
    pub const STAFF: AgeRange = AgeRange { min: 18, max: 30 };
    pub const PARENT: AgeRange = AgeRange { min: 30, max: 60 };

    /// First-year students are six.
    pub fn student(year: u8) -> AgeRange {
        let age = 6 + u32::from(year);
        AgeRange { min: age, max: age }
    }

    pub fn exact(age: u32) -> AgeRange {
        AgeRange { min: age, max: age }
    }
}

/// Human-like material an email address is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSeed {
    fragments: Vec<String>,
    tag: String,
    sequence: Option<u32>,
    domain: String,
}

impl EmailSeed {
    /// `first.last.prof3@domain` style seed.
    pub fn new(fragments: &[&str], tag: &str, sequence: u32, domain: &str) -> Self {
        Self {
            fragments: fragments.iter().map(|f| locale::slugify(f)).collect(),
            tag: tag.to_string(),
            sequence: Some(sequence),
            domain: domain.to_string(),
        }
    }

    /// Seed without a sequence index, e.g. `admin@domain`.
    pub fn fixed(local: &str, domain: &str) -> Self {
        Self {
            fragments: vec![locale::slugify(local)],
            tag: String::new(),
            sequence: None,
            domain: domain.to_string(),
        }
    }

    pub fn render(&self) -> String {
        let mut local = self
            .fragments
            .iter()
            .filter(|fragment| !fragment.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(".");
        if let Some(sequence) = self.sequence {
            if !local.is_empty() {
                local.push('.');
            }
            local.push_str(&self.tag);
            local.push_str(&sequence.to_string());
        }
        format!("{local}@{}", self.domain)
    }

    /// Same seed with the sequence index moved forward by one.
    pub fn bumped(&self) -> Self {
        let mut next = self.clone();
        next.sequence = Some(self.sequence.map_or(1, |n| n.saturating_add(1)));
        next
    }
}

/// Emails handed out so far in the run.
#[derive(Debug, Clone)]
pub struct EmailRegistry {
    used: HashSet<String>,
    max_attempts: u32,
}

impl EmailRegistry {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            used: HashSet::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Mark an email as taken without deriving it from a seed.
    pub fn reserve(&mut self, email: &str) -> bool {
        self.used.insert(email.to_lowercase())
    }

    pub fn contains(&self, email: &str) -> bool {
        self.used.contains(&email.to_lowercase())
    }

    /// Render the seed, bumping its sequence index until the result is unused.
    pub fn claim(&mut self, seed: &EmailSeed) -> Result<String, GenerationError> {
        let mut candidate = seed.clone();
        for _ in 0..self.max_attempts {
            let email = candidate.render();
            if self.reserve(&email) {
                return Ok(email);
            }
            tracing::debug!(email = %email, "email collision, bumping sequence");
            candidate = candidate.bumped();
        }
        Err(GenerationError::EmailExhausted {
            seed: seed.render(),
            attempts: self.max_attempts,
        })
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Produces locale-correct field values for synthetic people and accounts.
#[derive(Debug, Clone)]
pub struct EntityFactory {
    reference_date: NaiveDate,
    credential: FixtureCredential,
}

impl EntityFactory {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            credential: FixtureCredential,
        }
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn make_person<R: Rng + ?Sized>(&self, ages: AgeRange, rng: &mut R) -> PersonalData {
        PersonalData {
            full_name: locale::full_name(rng),
            birth_date: self.birth_date(ages, rng),
            address: locale::address(rng),
            phone_number: locale::phone_number(rng),
        }
    }

    /// Every account logs in with [`FixtureCredential::PLAIN_PASSWORD`].
    pub fn make_user(&self, role: Role, email: String) -> NewUser {
        NewUser {
            email,
            password_hash: self.credential.password_hash().to_string(),
            role,
        }
    }

    /// Uniform over every day on which someone would be between `ages.min`
    /// and `ages.max` years old at the reference date.
    pub fn birth_date<R: Rng + ?Sized>(&self, ages: AgeRange, rng: &mut R) -> NaiveDate {
        let (min, max) = if ages.min <= ages.max {
            (ages.min, ages.max)
        } else {
            (ages.max, ages.min)
        };
        let latest = years_before(self.reference_date, min);
        let earliest = years_before(self.reference_date, max.saturating_add(1))
            .checked_add_days(Days::new(1))
            .unwrap_or(latest);
        let span = (latest - earliest).num_days().max(0) as u64;
        let offset = rng.random_range(0..=span);
        earliest.checked_add_days(Days::new(offset)).unwrap_or(latest)
    }

    /// Seed for an email derived from a random name.
    pub fn name_seed<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        tag: &str,
        sequence: u32,
        domain: &str,
    ) -> EmailSeed {
        let first = locale::first_name(rng);
        let last = locale::last_name(rng);
        EmailSeed::new(&[first, last], tag, sequence, domain)
    }
}

fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN)
}

/// Whole years between `birth` and `on`.
pub fn age_on(birth: NaiveDate, on: NaiveDate) -> u32 {
    use chrono::Datelike;
    let mut age = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}
