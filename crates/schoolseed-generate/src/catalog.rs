//! Fixed vocabularies the generators draw from.

use chrono::NaiveTime;

use schoolseed_core::{Level, Shift};

pub const PRIMARY_SUBJECTS: &[&str] = &[
    "Matemática",
    "Lengua",
    "Ciencias Naturales",
    "Ciencias Sociales",
    "Educación Física",
    "Educación Artística",
    "Educación Musical",
    "Educación Tecnológica",
    "Inglés",
];

pub const SECONDARY_SUBJECTS: &[&str] = &[
    "Matemática",
    "Lengua y Literatura",
    "Historia",
    "Geografía",
    "Biología",
    "Física",
    "Química",
    "Educación Física",
    "Inglés",
    "Francés",
    "Educación Artística",
    "Educación Musical",
    "Educación Tecnológica",
    "Formación Ética y Ciudadana",
    "Psicología",
    "Filosofía",
    "Economía",
];

pub const ASSESSMENT_TASKS: &[&str] = &[
    "Examen parcial de la unidad 1",
    "Trabajo práctico sobre el tema estudiado",
    "Proyecto de investigación grupal",
    "Evaluación oral individual",
    "Informe de laboratorio",
    "Análisis de texto literario",
    "Resolución de problemas matemáticos",
    "Presentación oral del tema",
    "Cuestionario de repaso",
    "Ensayo argumentativo",
];

pub const MESSAGE_TITLES: &[&str] = &[
    "Reunión de padres",
    "Actividad deportiva",
    "Evento cultural",
    "Comunicado importante",
    "Recordatorio de fechas",
    "Cambio de horarios",
    "Información académica",
];

pub fn curriculum(level: Level) -> &'static [&'static str] {
    match level {
        Level::Primary => PRIMARY_SUBJECTS,
        Level::Secondary => SECONDARY_SUBJECTS,
    }
}

/// Half-open class period `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

pub(crate) const fn hm(hour: u32, minute: u32) -> NaiveTime {
    match NaiveTime::from_hms_opt(hour, minute, 0) {
        Some(time) => time,
        None => panic!("invalid slot time"),
    }
}

const fn slot(start: (u32, u32), end: (u32, u32)) -> TimeSlot {
    TimeSlot {
        start: hm(start.0, start.1),
        end: hm(end.0, end.1),
    }
}

pub const MORNING_SLOTS: &[TimeSlot] = &[
    slot((8, 0), (8, 40)),
    slot((8, 40), (9, 20)),
    slot((9, 20), (10, 0)),
    slot((10, 20), (11, 0)),
    slot((11, 0), (11, 40)),
    slot((11, 40), (12, 20)),
];

pub const AFTERNOON_SLOTS: &[TimeSlot] = &[
    slot((13, 30), (14, 10)),
    slot((14, 10), (14, 50)),
    slot((14, 50), (15, 30)),
    slot((15, 50), (16, 30)),
    slot((16, 30), (17, 10)),
];

pub fn slots_for(shift: Shift) -> &'static [TimeSlot] {
    match shift {
        Shift::Morning => MORNING_SLOTS,
        Shift::Afternoon => AFTERNOON_SLOTS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_ordered_and_disjoint() {
        for shift in [Shift::Morning, Shift::Afternoon] {
            let slots = slots_for(shift);
            for pair in slots.windows(2) {
                assert!(pair[0].start < pair[0].end);
                assert!(pair[0].end <= pair[1].start);
            }
        }
        assert_eq!(MORNING_SLOTS.len(), 6);
        assert_eq!(AFTERNOON_SLOTS.len(), 5);
        assert_eq!(MORNING_SLOTS[5].end, hm(12, 20));
        assert_eq!(AFTERNOON_SLOTS[0].start, hm(13, 30));
    }
}
