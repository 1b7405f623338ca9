//! InfraQuiz backend: LLM-generated AWS infrastructure quizzes with
//! validation, quality scoring, a pre-generated pool and a fallback bank.

pub mod util;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod config;
pub mod prompt;
pub mod completion;
pub mod validator;
pub mod scorer;
pub mod seeds;
pub mod cache;
pub mod repository;
pub mod reference;
pub mod generator;
pub mod logic;
pub mod protocol;
pub mod state;
pub mod routes;
pub mod telemetry;
