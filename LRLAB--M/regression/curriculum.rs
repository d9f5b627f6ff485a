use serde::{Deserialize, Serialize};

use crate::point::{Point, PointSet};

/// Lessons in teaching order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonId {
    /// What linear regression is.
    Intro,
    /// Lines, sums, derivatives, vectors.
    MathBasics,
    /// The hypothesis `y = wx + b`.
    Hypothesis,
    /// Mean squared error.
    LossFunction,
    /// Gradient descent.
    GradientDescent,
    /// Where regression is used.
    Applications,
    /// Free sandbox.
    Playground,
}

/// Catalog entry for one lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Lesson {
    /// Identifier.
    pub id: LessonId,
    /// Menu title.
    pub title: &'static str,
    /// One-line summary.
    pub description: &'static str,
}

/// All lessons, in order.
pub const LESSONS: [Lesson; 7] = [
    Lesson {
        id: LessonId::Intro,
        title: "1. What is linear regression?",
        description: "The \"Hello World\" of supervised learning",
    },
    Lesson {
        id: LessonId::MathBasics,
        title: "2. Math toolkit",
        description: "Building math intuition from scratch",
    },
    Lesson {
        id: LessonId::Hypothesis,
        title: "3. Core idea: the hypothesis function",
        description: "The magic of y = wx + b",
    },
    Lesson {
        id: LessonId::LossFunction,
        title: "4. The loss function",
        description: "What are we optimizing?",
    },
    Lesson {
        id: LessonId::GradientDescent,
        title: "5. Gradient descent",
        description: "Letting the machine learn on its own",
    },
    Lesson {
        id: LessonId::Applications,
        title: "6. Real-world applications",
        description: "What can it do?",
    },
    Lesson {
        id: LessonId::Playground,
        title: "7. Interactive lab",
        description: "Try it yourself",
    },
];

impl LessonId {
    fn index(self) -> usize {
        LESSONS
            .iter()
            .position(|lesson| lesson.id == self)
            .unwrap_or_default()
    }

    /// Catalog entry.
    #[must_use]
    pub fn lesson(self) -> &'static Lesson {
        &LESSONS[self.index()]
    }

    /// Following lesson, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        LESSONS.get(self.index() + 1).map(|lesson| lesson.id)
    }

    /// Preceding lesson, if any.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.index()
            .checked_sub(1)
            .map(|idx| LESSONS[idx].id)
    }
}

/// Three points used by the loss-function lesson.
#[must_use]
pub fn loss_lesson_points() -> PointSet {
    [Point::new(20.0, 30.0), Point::new(50.0, 50.0), Point::new(80.0, 70.0)]
        .into_iter()
        .collect()
}
