// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Prompt construction for the generator and validator stages.

use super::Revision;

/// Prompt for a generator round.
///
/// Without a revision this asks for a fresh answer. With one, the previous
/// answer, its verdict and the feedback are included verbatim and the agent is
/// asked to revise.
pub fn generator_prompt(question: &str, revision: Option<&Revision<'_>>) -> String {
    match revision {
        None => format!(
            "You are a principal engineer who has expertise in understanding code fast \
             and answering queries about it. With your expertise please answer this query \
             about the repository in your working directory: {question}"
        ),
        Some(revision) => format!(
            "Your previous answer was marked as {verdict} and needs improvement.\n\
             \n\
             Previous answer:\n\
             {answer}\n\
             \n\
             Feedback: {feedback}\n\
             \n\
             Original question: {question}\n\
             \n\
             Please revise the previous answer into an improved, complete answer that \
             addresses the feedback.",
            verdict = revision.verdict,
            answer = revision.previous_answer,
            feedback = revision.feedback,
        ),
    }
}

/// Prompt for a validator round.
pub fn validator_prompt(question: &str, answer: &str) -> String {
    format!(
        "You are validating an answer about the codebase in your working directory.\n\
         \n\
         Question: {question}\n\
         \n\
         Answer to validate:\n\
         {answer}\n\
         \n\
         Instructions:\n\
         1. Check if the answer correctly addresses the question\n\
         2. Verify code references are accurate (if any)\n\
         3. Check for completeness\n\
         \n\
         Respond with EXACTLY one of these formats:\n\
         - \"VALID\" - if the answer is correct and complete\n\
         - \"INVALID: <specific issues>\" - if there are factual errors\n\
         - \"PARTIAL: <what's missing>\" - if partially correct but incomplete\n\
         \n\
         Start your response with VALID, INVALID, or PARTIAL."
    )
}
