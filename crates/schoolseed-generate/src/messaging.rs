use fake::Fake;
use fake::faker::lorem::en::Paragraph;
use rand::Rng;
use rand::seq::{IndexedRandom, index};

use schoolseed_core::{
    CourseId, NewMessage, NewSubjectMessage, SubjectMessageType, SubjectRecord, UserId,
};

use crate::catalog::MESSAGE_TITLES;

pub const BROADCAST_CONTENT_CHARS: usize = 200;
pub const SUBJECT_CONTENT_CHARS: usize = 150;
pub const MAX_COURSES_PER_MESSAGE: usize = 3;

/// A broadcast message and the courses it is shown in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub message: NewMessage,
    pub courses: Vec<CourseId>,
}

/// `count` broadcasts from random senders, each linked to 1..=3 distinct courses.
///
/// An empty sender pool or course list produces nothing.
pub fn generate_broadcasts<R: Rng + ?Sized>(
    count: usize,
    senders: &[UserId],
    courses: &[CourseId],
    rng: &mut R,
) -> Vec<Broadcast> {
    if senders.is_empty() || courses.is_empty() {
        return Vec::new();
    }
    let mut broadcasts = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(sender_id) = senders.choose(rng).copied() else {
            break;
        };
        let title = MESSAGE_TITLES
            .choose(rng)
            .copied()
            .unwrap_or("Comunicado importante");
        let content = lorem(rng, BROADCAST_CONTENT_CHARS);
        let fanout = rng
            .random_range(1..=MAX_COURSES_PER_MESSAGE)
            .min(courses.len());
        let linked = index::sample(rng, courses.len(), fanout)
            .into_iter()
            .map(|idx| courses[idx])
            .collect();
        broadcasts.push(Broadcast {
            message: NewMessage {
                sender_id,
                title: title.to_string(),
                content,
            },
            courses: linked,
        });
    }
    broadcasts
}

/// 2..=5 messages posted to a subject by its teacher.
pub fn generate_subject_messages<R: Rng + ?Sized>(
    subject: &SubjectRecord,
    rng: &mut R,
) -> Vec<NewSubjectMessage> {
    let count = rng.random_range(2..=5);
    (0..count)
        .map(|_| NewSubjectMessage {
            sender_id: subject.teacher_id,
            subject_id: subject.id,
            title: format!("Información sobre {}", subject.name),
            content: lorem(rng, SUBJECT_CONTENT_CHARS),
            message_type: *SubjectMessageType::ALL
                .choose(rng)
                .unwrap_or(&SubjectMessageType::Message),
        })
        .collect()
}

fn lorem<R: Rng + ?Sized>(rng: &mut R, max_chars: usize) -> String {
    let text: String = Paragraph(3..6).fake_with_rng(rng);
    text.chars().take(max_chars).collect()
}
