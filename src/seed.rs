// Seed command - sample profiles, questions and answers
//
// Run with: physics-qa seed
//
// Safe to run repeatedly: rows that already exist (same id) are skipped,
// and answers are only added to questions created by this run.

use crate::backend::{Backend, BackendError};
use crate::model::{NewComment, NewProfile, NewQuestion, QuestionId, UserId};
use crate::slug::slugify;
use anyhow::Context;

struct SeedProfile {
    id: &'static str,
    username: &'static str,
    display_name: &'static str,
}

struct SeedQuestion {
    id: &'static str,
    title: &'static str,
    body: &'static str,
    category: &'static str,
    tags: &'static [&'static str],
    author: &'static str,
    answers: &'static [(&'static str, &'static str)],
}

const PROFILES: &[SeedProfile] = &[
    SeedProfile {
        id: "seed-rahim",
        username: "rahim",
        display_name: "রহিম উদ্দিন",
    },
    SeedProfile {
        id: "seed-nusrat",
        username: "nusrat",
        display_name: "নুসরাত জাহান",
    },
    SeedProfile {
        id: "seed-tanvir",
        username: "tanvir",
        display_name: "তানভীর হাসান",
    },
];

const QUESTIONS: &[SeedQuestion] = &[
    SeedQuestion {
        id: "seedq001",
        title: "নিউটনের দ্বিতীয় সূত্র কেন F = ma আকারে লেখা হয়?",
        body: "বইয়ে লেখা আছে বল ভরবেগের পরিবর্তনের হারের সমানুপাতিক। \
               তাহলে **F = ma** কখন সঠিক আর কখন নয়?",
        category: "বলবিদ্যা",
        tags: &["নিউটনের সূত্র", "বল"],
        author: "seed-rahim",
        answers: &[(
            "seed-nusrat",
            "ভর ধ্রুব থাকলে `dp/dt = m dv/dt = ma`। রকেটের মতো ভর বদলালে পুরো রূপটাই লাগবে।",
        )],
    },
    SeedQuestion {
        id: "seedq002",
        title: "বন্ধ ব্যবস্থায় এনট্রপি কি সবসময় বাড়ে?",
        body: "তাপগতিবিদ্যার দ্বিতীয় সূত্র অনুযায়ী এনট্রপি কমে না। \
               তাহলে ফ্রিজের ভেতরে জিনিস ঠান্ডা হয় কীভাবে?",
        category: "তাপগতিবিদ্যা",
        tags: &["এনট্রপি", "তাপ"],
        author: "seed-nusrat",
        answers: &[(
            "seed-tanvir",
            "ফ্রিজ বিচ্ছিন্ন ব্যবস্থা নয়। ভেতরের এনট্রপি কমে, কিন্তু বাইরে ছাড়া তাপে মোট এনট্রপি বাড়ে।",
        )],
    },
    SeedQuestion {
        id: "seedq003",
        title: "উত্তল লেন্সের ফোকাস দূরত্ব ঘরে বসে কীভাবে মাপব?",
        body: "ল্যাবে অপটিক্যাল বেঞ্চ নেই। জানালার আলো আর একটা পর্দা দিয়ে কি মোটামুটি মাপা যায়?",
        category: "আলোকবিজ্ঞান",
        tags: &["লেন্স", "প্রতিসরণ"],
        author: "seed-tanvir",
        answers: &[],
    },
    SeedQuestion {
        id: "seedq004",
        title: "আলোর তরঙ্গ-কণা দ্বৈততা বলতে আসলে কী বোঝায়?",
        body: "দ্বি-চিড় পরীক্ষায় ব্যতিচার দেখা যায়, আবার আলোক-তড়িৎ ক্রিয়ায় ফোটন কণার মতো আচরণ করে। \
               দুটো একসাথে কীভাবে সত্য?",
        category: "আধুনিক পদার্থবিজ্ঞান",
        tags: &["কোয়ান্টাম"],
        author: "seed-rahim",
        answers: &[],
    },
];

/// Counts from one seed run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub profiles_created: usize,
    pub questions_created: usize,
    pub answers_created: usize,
    pub skipped: usize,
}

impl std::fmt::Display for SeedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} profiles, {} questions, {} answers created ({} already present)",
            self.profiles_created, self.questions_created, self.answers_created, self.skipped
        )
    }
}

/// Insert the sample data into `backend`
pub async fn run(backend: &dyn Backend) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();

    for seed in PROFILES {
        let id = UserId(seed.id.to_string());
        match backend.get_profile(&id).await {
            Ok(_) => {
                report.skipped += 1;
                continue;
            }
            Err(BackendError::NotFound) => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to read profile {}", seed.id)),
        }

        let profile = NewProfile {
            id,
            username: seed.username.to_string(),
            display_name: seed.display_name.to_string(),
            avatar_url: None,
        };
        match backend.insert_profile(&profile).await {
            Ok(_) => report.profiles_created += 1,
            Err(BackendError::Conflict(detail)) => {
                tracing::warn!(username = seed.username, "Seed username taken: {}", detail);
                report.skipped += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to insert profile {}", seed.id))
            }
        }
    }

    for seed in QUESTIONS {
        let question = NewQuestion {
            id: QuestionId(seed.id.to_string()),
            title: seed.title.to_string(),
            body: seed.body.to_string(),
            category: seed.category.to_string(),
            tags: seed.tags.iter().map(|t| t.to_string()).collect(),
            slug: slugify(seed.title),
            author_id: UserId(seed.author.to_string()),
        };

        match backend.insert_question(&question).await {
            Ok(created) => {
                tracing::info!(id = %created.id, "Seeded question");
                report.questions_created += 1;
            }
            Err(BackendError::Conflict(_)) => {
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to insert question {}", seed.id))
            }
        }

        for (author, body) in seed.answers {
            let comment = NewComment {
                question_id: question.id.clone(),
                author_id: UserId(author.to_string()),
                body: body.to_string(),
            };
            backend
                .insert_comment(&comment)
                .await
                .with_context(|| format!("Failed to add answer to {}", seed.id))?;
            report.answers_created += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sqlite::SqliteBackend;
    use crate::backend::QuestionQuery;
    use crate::catalog;

    #[test]
    fn test_seed_tags_come_from_the_catalog() {
        for seed in QUESTIONS {
            let category = catalog::category(seed.category).unwrap();
            assert!(!seed.tags.is_empty() && seed.tags.len() <= 3, "{}", seed.id);
            for tag in seed.tags {
                assert!(category.contains(tag), "{} not in {}", tag, seed.category);
            }
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let backend = SqliteBackend::in_memory().unwrap();

        let first = run(&backend).await.unwrap();
        assert_eq!(first.profiles_created, PROFILES.len());
        assert_eq!(first.questions_created, QUESTIONS.len());
        assert_eq!(first.answers_created, 2);
        assert_eq!(first.skipped, 0);

        let second = run(&backend).await.unwrap();
        assert_eq!(second.profiles_created, 0);
        assert_eq!(second.questions_created, 0);
        assert_eq!(second.answers_created, 0);
        assert_eq!(second.skipped, PROFILES.len() + QUESTIONS.len());

        let rows = backend
            .list_questions(&QuestionQuery {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), QUESTIONS.len());
        let answered = rows.iter().find(|r| r.question.id.0 == "seedq001").unwrap();
        assert_eq!(answered.question.answer_count, 1);
    }
}
