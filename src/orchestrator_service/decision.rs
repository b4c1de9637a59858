use crate::ports::NavigationAdvice;
use crate::types::Position;

/// How the next SEEK picks its candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekMode {
    /// Ask the navigation oracle and fall back to the resolver.
    #[default]
    Consult,
    /// The previous candidate was rejected: use the advisory alternative when
    /// it is plausible, otherwise the resolver. The oracle is skipped.
    Recover { hint: Option<Position> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Navigator,
    Resolver,
    Advisory,
}

impl CandidateSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Navigator => "navigator",
            Self::Resolver => "resolver",
            Self::Advisory => "advisory",
        }
    }
}

/// Output of SEEK: a proposed cell plus whatever the oracle said about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveDecision {
    pub candidate: Position,
    pub source: CandidateSource,
    pub advice: Option<NavigationAdvice>,
}

impl MoveDecision {
    #[must_use]
    pub const fn resolved(candidate: Position, advice: Option<NavigationAdvice>) -> Self {
        Self {
            candidate,
            source: CandidateSource::Resolver,
            advice,
        }
    }

    #[must_use]
    pub fn requests_attachment(&self) -> bool {
        self.advice
            .as_ref()
            .is_some_and(|advice| advice.request_attachment)
    }
}
