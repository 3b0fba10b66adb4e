//! es_AR personal data: names, street addresses and phone numbers.

use rand::Rng;
use rand::seq::IndexedRandom;

pub fn first_name<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    pick(FIRST_NAMES, rng, "Juan")
}

pub fn last_name<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    pick(LAST_NAMES, rng, "Pérez")
}

pub fn full_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = first_name(rng);
    let last = last_name(rng);
    if rng.random_bool(0.2) {
        let second = last_name(rng);
        format!("{first} {last} {second}")
    } else {
        format!("{first} {last}")
    }
}

pub fn address<R: Rng + ?Sized>(rng: &mut R) -> String {
    let street = pick(STREETS, rng, "San Martín");
    let number = rng.random_range(1..=9999);
    let (city, province) = CITIES.choose(rng).copied().unwrap_or(("Rosario", "Santa Fe"));
    format!("{street} {number}, {city}, {province}")
}

/// Mobile number in international format, e.g. `+54 9 341 555-0193`.
pub fn phone_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    let area = pick(AREA_CODES, rng, "11");
    // National numbers are ten digits: the area code plus the subscriber number.
    let subscriber_len = 10 - area.len() as u32;
    let prefix_len = subscriber_len - 4;
    let prefix = rng.random_range(10_u32.pow(prefix_len - 1)..10_u32.pow(prefix_len));
    let suffix = rng.random_range(0..=9999);
    format!("+54 9 {area} {prefix}-{suffix:04}")
}

/// Lowercase ASCII form of a name fragment, usable in an email local part.
pub fn slugify(value: &str) -> String {
    value
        .chars()
        .map(fold_accent)
        .filter(|ch| ch.is_ascii_alphanumeric())
        .flat_map(|ch| ch.to_lowercase())
        .collect()
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'Á' | 'À' | 'Ä' => 'a',
        'é' | 'è' | 'ë' | 'É' | 'È' | 'Ë' => 'e',
        'í' | 'ì' | 'ï' | 'Í' | 'Ì' | 'Ï' => 'i',
        'ó' | 'ò' | 'ö' | 'Ó' | 'Ò' | 'Ö' => 'o',
        'ú' | 'ù' | 'ü' | 'Ú' | 'Ù' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        other => other,
    }
}

fn pick<R: Rng + ?Sized>(values: &[&'static str], rng: &mut R, fallback: &'static str) -> &'static str {
    values.choose(rng).copied().unwrap_or(fallback)
}

const FIRST_NAMES: &[&str] = &[
    "Agustín", "Alejandro", "Ana", "Belén", "Benjamín", "Camila", "Carolina", "Catalina",
    "Diego", "Facundo", "Florencia", "Francisco", "Gonzalo", "Ignacio", "Joaquín", "Julieta",
    "Lautaro", "Lucía", "Martina", "Mateo", "Micaela", "Nicolás", "Paula", "Santiago",
    "Sofía", "Tomás", "Valentina", "Valentino", "Victoria", "Ximena",
];

const LAST_NAMES: &[&str] = &[
    "Acosta", "Álvarez", "Benítez", "Castro", "Díaz", "Fernández", "Flores", "Gómez",
    "González", "Gutiérrez", "Herrera", "Juárez", "López", "Martínez", "Medina", "Molina",
    "Morales", "Muñoz", "Núñez", "Pereyra", "Pérez", "Ramírez", "Rodríguez", "Romero",
    "Ruiz", "Sánchez", "Sosa", "Suárez", "Torres", "Giménez",
];

const STREETS: &[&str] = &[
    "Av. Corrientes",
    "Av. Rivadavia",
    "Av. Pellegrini",
    "Bv. Oroño",
    "Belgrano",
    "Córdoba",
    "Entre Ríos",
    "Lavalle",
    "Mitre",
    "Moreno",
    "San Martín",
    "Santa Fe",
    "Sarmiento",
    "Urquiza",
];

const CITIES: &[(&str, &str)] = &[
    ("Rosario", "Santa Fe"),
    ("Santa Fe", "Santa Fe"),
    ("Buenos Aires", "CABA"),
    ("La Plata", "Buenos Aires"),
    ("Mar del Plata", "Buenos Aires"),
    ("Córdoba", "Córdoba"),
    ("Mendoza", "Mendoza"),
    ("San Miguel de Tucumán", "Tucumán"),
];

const AREA_CODES: &[&str] = &["11", "221", "223", "341", "342", "351", "261", "381"];

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn phone_numbers_have_ten_national_digits() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let phone = phone_number(&mut rng);
            assert!(phone.starts_with("+54 9 "), "{phone}");
            let digits: String = phone["+54 9 ".len()..]
                .chars()
                .filter(|ch| ch.is_ascii_digit())
                .collect();
            assert_eq!(digits.len(), 10, "{phone}");
        }
    }

    #[test]
    fn slugify_folds_spanish_accents() {
        assert_eq!(slugify("Núñez"), "nunez");
        assert_eq!(slugify("Álvarez"), "alvarez");
        assert_eq!(slugify("de la Cruz"), "delacruz");
    }

    #[test]
    fn addresses_name_a_street_number_and_city() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let value = address(&mut rng);
        assert_eq!(value.matches(", ").count(), 2, "{value}");
    }
}
