use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::{Rng, rng};

use quiz_core::model::{Difficulty, Question, QuestionId};

use super::{QuestionSupplier, QuizRequest};
use crate::error::SupplyError;

struct Fixture {
    prompt: &'static str,
    correct: &'static str,
    wrong: [&'static str; 3],
    explanation: &'static str,
    difficulty: Difficulty,
    category: &'static str,
    points: u32,
}

struct Bank {
    topic: &'static str,
    questions: &'static [Fixture],
}

const SCIENCE: &[Fixture] = &[
    Fixture {
        prompt: "How does heat transfer work?",
        correct: "Through conduction, convection, and radiation",
        wrong: [
            "Through chemical reactions only",
            "Through electrical circuits",
            "Through magnetic fields",
        ],
        explanation: "Heat moves by conduction (direct contact), convection (fluid movement) \
                      and radiation (electromagnetic waves).",
        difficulty: Difficulty::Easy,
        category: "Science - Physics",
        points: 100,
    },
    Fixture {
        prompt: "What is the acceleration due to gravity at Earth's surface?",
        correct: "9.8 m/s²",
        wrong: ["6.67 m/s²", "3.14 m/s²", "1.0 m/s²"],
        explanation: "Gravity accelerates objects at roughly 9.8 m/s² near the surface, \
                      varying slightly with altitude and location.",
        difficulty: Difficulty::Medium,
        category: "Science - Physics",
        points: 150,
    },
    Fixture {
        prompt: "Why does cell division happen?",
        correct: "For growth, repair, and reproduction",
        wrong: [
            "To create energy",
            "To absorb nutrients",
            "To produce oxygen",
        ],
        explanation: "Mitosis and meiosis let organisms grow, repair tissue and reproduce.",
        difficulty: Difficulty::Medium,
        category: "Science - Biology",
        points: 150,
    },
    Fixture {
        prompt: "What is the primary function of mitochondria?",
        correct: "Produce cellular energy (ATP)",
        wrong: [
            "Store genetic information",
            "Synthesize proteins",
            "Detoxify the cell",
        ],
        explanation: "Mitochondria produce ATP through cellular respiration.",
        difficulty: Difficulty::Medium,
        category: "Science - Biology",
        points: 150,
    },
    Fixture {
        prompt: "Which gas is most abundant in Earth's atmosphere?",
        correct: "Nitrogen (N₂)",
        wrong: ["Oxygen (O₂)", "Carbon dioxide (CO₂)", "Argon (Ar)"],
        explanation: "Nitrogen makes up about 78% of the atmosphere, oxygen about 21%.",
        difficulty: Difficulty::Easy,
        category: "Science - Chemistry",
        points: 100,
    },
];

const MATHEMATICS: &[Fixture] = &[
    Fixture {
        prompt: "What is the value of π (pi) to two decimal places?",
        correct: "3.14",
        wrong: ["2.71", "1.62", "3.00"],
        explanation: "π is the ratio of a circle's circumference to its diameter, about 3.14159.",
        difficulty: Difficulty::Easy,
        category: "Mathematics - Geometry",
        points: 100,
    },
    Fixture {
        prompt: "What does the Pythagorean theorem calculate?",
        correct: "The relationship between sides of a right triangle",
        wrong: [
            "The area of a circle",
            "The volume of a sphere",
            "The slope of a line",
        ],
        explanation: "In a right triangle the square of the hypotenuse equals the sum of the \
                      squares of the other two sides.",
        difficulty: Difficulty::Medium,
        category: "Mathematics - Geometry",
        points: 150,
    },
    Fixture {
        prompt: "What is the derivative of x²?",
        correct: "2x",
        wrong: ["x", "x³/3", "2x²"],
        explanation: "By the power rule, d/dx(xⁿ) = n·xⁿ⁻¹.",
        difficulty: Difficulty::Medium,
        category: "Mathematics - Calculus",
        points: 150,
    },
    Fixture {
        prompt: "What is the mean of the numbers 4, 8, 6, 5, 7?",
        correct: "6",
        wrong: ["5", "7", "8"],
        explanation: "(4 + 8 + 6 + 5 + 7) ÷ 5 = 30 ÷ 5 = 6.",
        difficulty: Difficulty::Easy,
        category: "Mathematics - Statistics",
        points: 100,
    },
    Fixture {
        prompt: "Solve for x: 2x + 5 = 15",
        correct: "5",
        wrong: ["10", "7.5", "20"],
        explanation: "Subtract 5 from both sides to get 2x = 10, then divide by 2.",
        difficulty: Difficulty::Easy,
        category: "Mathematics - Algebra",
        points: 100,
    },
];

const PROGRAMMING: &[Fixture] = &[
    Fixture {
        prompt: "What does HTML stand for?",
        correct: "HyperText Markup Language",
        wrong: [
            "HighText Machine Language",
            "HyperTransfer Markup Language",
            "HighTech Media Language",
        ],
        explanation: "HTML is the standard markup language for documents shown in a browser.",
        difficulty: Difficulty::Easy,
        category: "Computer Science - Web Development",
        points: 100,
    },
    Fixture {
        prompt: "What is the time complexity of binary search?",
        correct: "O(log n)",
        wrong: ["O(n)", "O(n²)", "O(1)"],
        explanation: "Each comparison halves the search space of a sorted array.",
        difficulty: Difficulty::Medium,
        category: "Computer Science - Algorithms",
        points: 150,
    },
    Fixture {
        prompt: "Which data structure uses LIFO (Last In, First Out)?",
        correct: "Stack",
        wrong: ["Queue", "Linked List", "Tree"],
        explanation: "The last element pushed onto a stack is the first one popped.",
        difficulty: Difficulty::Medium,
        category: "Computer Science - Data Structures",
        points: 150,
    },
    Fixture {
        prompt: "What is machine learning?",
        correct: "AI systems that learn from data",
        wrong: [
            "Manual programming of rules",
            "Hardware optimization",
            "Network configuration",
        ],
        explanation: "Machine learning algorithms learn patterns from data instead of \
                      following hand-written rules.",
        difficulty: Difficulty::Hard,
        category: "Computer Science - AI",
        points: 200,
    },
    Fixture {
        prompt: "What does API stand for?",
        correct: "Application Programming Interface",
        wrong: [
            "Advanced Programming Interface",
            "Application Protocol Interface",
            "Advanced Protocol Interface",
        ],
        explanation: "An API is a set of rules that lets software components talk to each other.",
        difficulty: Difficulty::Medium,
        category: "Computer Science - Software Engineering",
        points: 150,
    },
];

const BANKS: &[Bank] = &[
    Bank {
        topic: "Science",
        questions: SCIENCE,
    },
    Bank {
        topic: "Mathematics",
        questions: MATHEMATICS,
    },
    Bank {
        topic: "Programming",
        questions: PROGRAMMING,
    },
];

const DEFAULT_BANK: usize = 2;

fn bank_for(topic: &str) -> &'static Bank {
    let wanted = topic.trim().to_lowercase();
    BANKS
        .iter()
        .find(|bank| {
            let name = bank.topic.to_lowercase();
            wanted.contains(&name) || name.contains(&wanted)
        })
        .unwrap_or(&BANKS[DEFAULT_BANK])
}

/// Serves built-in demo questions. Never unavailable.
///
/// Unknown topics get the default bank. Requests larger than a bank cycle
/// through it again under fresh question ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSupplier {
    shuffle: bool,
}

impl StaticSupplier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Randomize question order and the position of the correct option.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Topics with a dedicated question bank.
    pub fn topics() -> impl Iterator<Item = &'static str> {
        BANKS.iter().map(|bank| bank.topic)
    }

    fn build(&self, request: &QuizRequest) -> Result<Vec<Question>, SupplyError> {
        let bank = bank_for(request.topic());
        let mut order: Vec<usize> = (0..bank.questions.len()).collect();
        let mut rng = rng();
        if self.shuffle {
            order.shuffle(&mut rng);
        }

        (0..request.count())
            .map(|n| {
                let fixture = &bank.questions[order[n % order.len()]];
                let slots = fixture.wrong.len() + 1;
                let position = if self.shuffle {
                    rng.random_range(0..slots)
                } else {
                    n % slots
                };
                let mut options: Vec<String> =
                    fixture.wrong.iter().map(|w| (*w).to_string()).collect();
                options.insert(position, fixture.correct.to_string());

                let id = QuestionId::new(u64::try_from(n).unwrap_or(u64::MAX).saturating_add(1));
                Question::new(id, fixture.prompt, options, position, fixture.points)
                    .map(|q| {
                        q.with_explanation(fixture.explanation)
                            .with_difficulty(fixture.difficulty)
                            .with_category(fixture.category)
                    })
                    .map_err(|source| SupplyError::InvalidQuestion { index: n, source })
            })
            .collect()
    }
}

#[async_trait]
impl QuestionSupplier for StaticSupplier {
    async fn supply(&self, request: &QuizRequest) -> Result<Vec<Question>, SupplyError> {
        self.build(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn request(topic: &str, count: usize) -> QuizRequest {
        QuizRequest::new(topic, Difficulty::Medium, count).unwrap()
    }

    #[tokio::test]
    async fn serves_requested_count() {
        let questions = StaticSupplier::new()
            .supply(&request("Science", 3))
            .await
            .unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].prompt(), "How does heat transfer work?");
    }

    #[tokio::test]
    async fn topic_lookup_is_case_insensitive_substring() {
        let questions = StaticSupplier::new()
            .supply(&request("basic MATHEMATICS", 1))
            .await
            .unwrap();
        assert_eq!(questions[0].category(), Some("Mathematics - Geometry"));
    }

    #[tokio::test]
    async fn unknown_topic_uses_default_bank() {
        let questions = StaticSupplier::new()
            .supply(&request("Medieval Poetry", 1))
            .await
            .unwrap();
        assert_eq!(questions[0].prompt(), "What does HTML stand for?");
    }

    #[tokio::test]
    async fn large_requests_cycle_with_unique_ids() {
        let questions = StaticSupplier::new()
            .supply(&request("Programming", 12))
            .await
            .unwrap();
        assert_eq!(questions.len(), 12);
        let ids: HashSet<_> = questions.iter().map(Question::id).collect();
        assert_eq!(ids.len(), 12);
        assert_eq!(questions[0].prompt(), questions[5].prompt());
    }

    #[tokio::test]
    async fn correct_option_points_at_the_right_answer() {
        for shuffle in [false, true] {
            let questions = StaticSupplier::new()
                .with_shuffle(shuffle)
                .supply(&request("Science", 5))
                .await
                .unwrap();
            for q in &questions {
                let fixture = SCIENCE.iter().find(|f| f.prompt == q.prompt()).unwrap();
                assert_eq!(q.options()[q.correct_index()], fixture.correct);
                assert_eq!(q.options().len(), 4);
            }
        }
    }

    #[test]
    fn lists_topics() {
        let topics: Vec<_> = StaticSupplier::topics().collect();
        assert_eq!(topics, vec!["Science", "Mathematics", "Programming"]);
    }
}
