/// Synthetic users and tasks for seeding
///
/// All generators take the caller's RNG so a seeded [`StdRng`] gives a
/// reproducible data set.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use taskledger_shared::models::task::NewTask;
use taskledger_shared::models::user::NewUser;

const FIRST_NAMES: &[&str] = &[
    "Olena", "Taras", "Iryna", "Bohdan", "Oksana", "Andrii", "Kateryna", "Dmytro", "Nataliia", "Yurii",
    "Sofiia", "Maksym", "Halyna", "Petro", "Larysa", "Ostap",
];

const LAST_NAMES: &[&str] = &[
    "Kovalenko", "Shevchenko", "Bondarenko", "Tkachenko", "Kravchenko", "Oliinyk", "Melnyk", "Marchenko",
    "Lysenko", "Rudenko", "Savchenko", "Petrenko",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

const WORDS: &[&str] = &[
    "report", "budget", "review", "meeting", "draft", "invoice", "schedule", "backup", "release", "audit",
    "contract", "plan", "summary", "inventory", "survey", "update", "client", "server", "archive", "training",
];

/// Chance that a generated task has no description
const MISSING_DESCRIPTION_RATIO: f64 = 0.1;

pub fn full_name(rng: &mut StdRng) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

/// Email derived from `fullname`
///
/// `index` and a random number keep addresses distinct within and across
/// seeding runs; a rare collision stops the batch with a unique violation.
pub fn email(rng: &mut StdRng, fullname: &str, index: usize) -> String {
    let local: String = fullname
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(".");
    let salt: u32 = rng.gen_range(0..1_000_000);
    format!("{}.{}{}@{}", local, index, salt, pick(rng, EMAIL_DOMAINS))
}

/// Short capitalized sentence of `words` words
pub fn sentence(rng: &mut StdRng, words: usize) -> String {
    let mut text = (0..words.max(1))
        .map(|_| pick(rng, WORDS))
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(first) = text.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    text.push('.');
    text
}

/// Paragraph of at most `max_chars` characters
pub fn paragraph(rng: &mut StdRng, max_chars: usize) -> String {
    let mut text = String::new();
    loop {
        let words = rng.gen_range(4..10);
        let next = sentence(rng, words);
        let separator = usize::from(!text.is_empty());
        if text.len() + separator + next.len() > max_chars {
            break;
        }
        if separator == 1 {
            text.push(' ');
        }
        text.push_str(&next);
    }
    text
}

pub fn user(rng: &mut StdRng, index: usize) -> NewUser {
    let fullname = full_name(rng);
    let email = email(rng, &fullname, index);
    NewUser { fullname, email }
}

/// Identifiers new tasks may reference
#[derive(Debug, Clone)]
pub struct TaskRefs {
    status_ids: Vec<i32>,
    user_ids: Vec<i32>,
}

impl TaskRefs {
    /// `None` unless both lists are non-empty
    pub fn new(status_ids: Vec<i32>, user_ids: Vec<i32>) -> Option<Self> {
        if status_ids.is_empty() || user_ids.is_empty() {
            return None;
        }
        Some(Self { status_ids, user_ids })
    }
}

/// Task owned by a random user, in a random status
pub fn task(rng: &mut StdRng, refs: &TaskRefs) -> NewTask {
    let description = if rng.gen_bool(MISSING_DESCRIPTION_RATIO) {
        None
    } else {
        Some(paragraph(rng, 200))
    };

    NewTask {
        title: sentence(rng, 3),
        description,
        status_id: refs.status_ids[rng.gen_range(0..refs.status_ids.len())],
        user_id: refs.user_ids[rng.gen_range(0..refs.user_ids.len())],
    }
}

fn pick(rng: &mut StdRng, values: &[&'static str]) -> &'static str {
    values.choose(rng).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use validator::Validate;

    #[test]
    fn test_generated_users_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for index in 0..50 {
            let user = user(&mut rng, index);
            assert!(user.validate().is_ok(), "invalid user: {:?}", user);
        }
    }

    #[test]
    fn test_generated_tasks_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        let refs = TaskRefs::new(vec![1, 2, 3], vec![10, 20]).unwrap();
        for _ in 0..50 {
            let task = task(&mut rng, &refs);
            assert!(task.validate().is_ok(), "invalid task: {:?}", task);
            assert!([1, 2, 3].contains(&task.status_id));
            assert!([10, 20].contains(&task.user_id));
            if let Some(description) = &task.description {
                assert!(description.len() <= 200);
            }
        }
    }

    #[test]
    fn test_task_refs_require_both_sides() {
        assert!(TaskRefs::new(vec![], vec![1]).is_none());
        assert!(TaskRefs::new(vec![1], vec![]).is_none());
    }

    #[test]
    fn test_same_seed_same_data() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(user(&mut a, 0).email, user(&mut b, 0).email);
    }

    #[test]
    fn test_sentence_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let text = sentence(&mut rng, 3);
        assert_eq!(text.split_whitespace().count(), 3);
        assert!(text.ends_with('.'));
        assert!(text.chars().next().is_some_and(|c| c.is_ascii_uppercase()));
    }
}
