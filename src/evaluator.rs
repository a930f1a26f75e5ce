//! Submission grading
//!
//! Turns a raw submission into one `TestResult` per test vector (or a single
//! result when a pre-check short-circuits). Nothing here returns an error: every
//! fault becomes data the challenge panel can show.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::catalog::{Challenge, ChallengeCheck, TestCase};
use crate::error::{ScriptError, SubmissionFault};
use crate::script::ast::FunctionDef;
use crate::script::{Interpreter, Limits, Tok, Token, Value, parse, tokenize};

/// Submissions with a `pass` placeholder and at most this many lines are
/// treated as untouched templates
const PLACEHOLDER_MAX_LINES: usize = 5;

/// Outcome class of a single result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Success,
    Failure,
    Error,
    Syntax,
}

/// Verdict for one test vector (or one pre-check)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub passed: bool,
    pub message: String,
    pub kind: ResultKind,
    pub details: Option<String>,
    pub hint: Option<String>,
    pub suggestion: Option<String>,
    /// Lines the submission printed during this test
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
    pub fault: Option<SubmissionFault>,
}

impl TestResult {
    fn success(message: String, details: Option<String>) -> Self {
        Self {
            passed: true,
            message,
            kind: ResultKind::Success,
            details,
            hint: None,
            suggestion: None,
            output: Vec::new(),
            fault: None,
        }
    }

    fn fault(
        fault: SubmissionFault,
        kind: ResultKind,
        message: String,
        details: impl Into<String>,
        hint: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            passed: false,
            message,
            kind,
            details: Some(details.into()),
            hint: Some(hint.into()),
            suggestion: Some(suggestion.into()),
            output: Vec::new(),
            fault: Some(fault),
        }
    }

    fn with_output(mut self, output: Vec<String>) -> Self {
        self.output = output;
        self
    }
}

/// True when a result set is a full solve
pub fn all_passed(results: &[TestResult]) -> bool {
    !results.is_empty() && results.iter().all(|r| r.passed)
}

/// How infinite-loop repair exercises are graded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoopFixMode {
    /// Run the repaired function against the test vectors
    #[default]
    Execute,
    /// Accept any source that decrements the loop variable, without running it.
    /// Textual only: it can be satisfied by code that still never terminates.
    Pattern,
}

impl LoopFixMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopFixMode::Execute => "execute",
            LoopFixMode::Pattern => "pattern",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "execute" | "exec" => Some(LoopFixMode::Execute),
            "pattern" => Some(LoopFixMode::Pattern),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluatorConfig {
    pub limits: Limits,
    pub loop_fix: LoopFixMode,
}

/// How the function under test was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Defined under the challenge's entry-point name
    ExactName,
    /// Entry point missing; fell back to the first `def` in the source
    FirstDeclared,
}

/// Find the function a challenge should call
pub fn resolve_entry(interp: &Interpreter, entry_point: &str) -> Option<(Rc<FunctionDef>, Lookup)> {
    if let Some(def) = interp.function(entry_point) {
        return Some((def, Lookup::ExactName));
    }
    interp
        .declared()
        .first()
        .map(|def| (Rc::clone(def), Lookup::FirstDeclared))
}

/// Direction a statement moves the loop variable by one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    Increment,
    Decrement,
}

/// Tokens for the textual checks. When the whole submission does not lex
/// (bad dedent, stray character), each line is lexed on its own so one broken
/// line cannot hide a `pass` or a loop-variable update elsewhere.
fn scan_tokens(code: &str) -> Vec<Token> {
    match tokenize(code) {
        Ok(tokens) => tokens,
        Err(err) => {
            log::debug!("Falling back to line-wise scan: {err}");
            code.lines()
                .filter_map(|line| tokenize(line.trim()).ok())
                .flatten()
                .collect()
        }
    }
}

/// Find `v += 1`, `v = v + 1` and their decrement forms in a token stream
fn loop_adjustments(tokens: &[Token], variable: &str) -> Vec<Adjustment> {
    let toks: Vec<&Tok> = tokens.iter().map(|t| &t.tok).collect();
    let is_var = |tok: &Tok| matches!(tok, Tok::Name(name) if name == variable);
    let mut found = Vec::new();
    for (i, &tok) in toks.iter().enumerate() {
        if !is_var(tok) {
            continue;
        }
        match toks.get(i + 1..i + 3) {
            Some([Tok::PlusAssign, Tok::Int(1)]) => found.push(Adjustment::Increment),
            Some([Tok::MinusAssign, Tok::Int(1)]) => found.push(Adjustment::Decrement),
            _ => {}
        }
        if let Some([Tok::Assign, other, op, Tok::Int(1)]) = toks.get(i + 1..i + 5)
            && is_var(*other)
        {
            match op {
                Tok::Plus => found.push(Adjustment::Increment),
                Tok::Minus => found.push(Adjustment::Decrement),
                _ => {}
            }
        }
    }
    found
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Grade `code` against every test vector of `challenge`
    pub fn evaluate(&self, challenge: &Challenge, code: &str) -> Vec<TestResult> {
        let code = code.trim();
        let tokens = scan_tokens(code);

        if let Some(result) = precheck(code, &tokens) {
            log::debug!("{}: pre-check rejected submission ({})", challenge.id, result.message);
            return vec![result];
        }

        if let ChallengeCheck::LoopFix { variable } = &challenge.check {
            let adjustments = loop_adjustments(&tokens, variable);
            if adjustments.contains(&Adjustment::Increment) {
                return vec![TestResult::fault(
                    SubmissionFault::AggravatedLoop,
                    ResultKind::Failure,
                    SubmissionFault::AggravatedLoop.to_string(),
                    format!(
                        "You're incrementing '{variable}' instead of decrementing it. This will make the infinite loop worse!"
                    ),
                    format!("You need to make '{variable}' smaller each iteration, not larger."),
                    format!("Change '{variable} += 1' to '{variable} -= 1' to count down instead of up."),
                )];
            }
            if self.config.loop_fix == LoopFixMode::Pattern {
                // Not run, but it still has to be valid code
                if let Err(err) = parse(code) {
                    return vec![syntax_result(&err)];
                }
                return pattern_verdict(challenge, variable, &adjustments);
            }
        }

        self.execute(challenge, code)
    }

    fn execute(&self, challenge: &Challenge, code: &str) -> Vec<TestResult> {
        let module = match parse(code) {
            Ok(module) => module,
            Err(err) => return vec![syntax_result(&err)],
        };

        let mut interp = Interpreter::new(self.config.limits);
        if let Err(err) = interp.load(&module) {
            let output = interp.take_output();
            let result = match err {
                ScriptError::Syntax { .. } => syntax_result(&err),
                ScriptError::StepLimit { .. } => iteration_limit(challenge, "Module", &err),
                _ => TestResult::fault(
                    SubmissionFault::Runtime,
                    ResultKind::Error,
                    "❌ Runtime Error while loading module".to_string(),
                    err.to_string(),
                    "Check for syntax errors, undefined variables, or logic issues.",
                    "Review your code for typos, missing variables, or incorrect syntax.",
                ),
            };
            return vec![result.with_output(output)];
        }

        let entry = resolve_entry(&interp, &challenge.entry_point);
        if let Some((def, Lookup::FirstDeclared)) = &entry {
            log::debug!(
                "{}: '{}' not defined, falling back to '{}'",
                challenge.id,
                challenge.entry_point,
                def.name
            );
        }

        challenge
            .test_cases
            .iter()
            .enumerate()
            .map(|(i, case)| match &entry {
                Some((def, _)) => run_case(&interp, def, challenge, i + 1, case),
                None => TestResult::fault(
                    SubmissionFault::FunctionNotFound,
                    ResultKind::Error,
                    format!("Test {}: {}", i + 1, SubmissionFault::FunctionNotFound),
                    "The expected function was not found in your code.",
                    "Make sure your function name matches the template exactly.",
                    "Check that you haven't changed the function name from the template.",
                ),
            })
            .collect()
    }
}

fn precheck(code: &str, tokens: &[Token]) -> Option<TestResult> {
    if code.is_empty() {
        return Some(TestResult::fault(
            SubmissionFault::Empty,
            ResultKind::Error,
            SubmissionFault::Empty.to_string(),
            "The code editor is empty. Please write some code before running tests.",
            "Start by implementing the function as described in the challenge.",
            "Look at the function template and replace 'pass' with your implementation.",
        ));
    }
    if !code.contains("def ") {
        return Some(TestResult::fault(
            SubmissionFault::MissingFunction,
            ResultKind::Syntax,
            SubmissionFault::MissingFunction.to_string(),
            "Your code should contain a function definition starting with 'def'.",
            "Make sure you have a function definition like 'def function_name():'",
            "Keep the existing function signature and just replace the 'pass' statement.",
        ));
    }
    let has_pass = tokens.iter().any(|t| t.tok == Tok::Pass);
    if has_pass && code.lines().count() <= PLACEHOLDER_MAX_LINES {
        return Some(TestResult::fault(
            SubmissionFault::Unimplemented,
            ResultKind::Error,
            SubmissionFault::Unimplemented.to_string(),
            "The function still contains 'pass' and appears to be unimplemented.",
            "Replace 'pass' with your actual implementation.",
            "Remove the 'pass' statement and add code that solves the problem.",
        ));
    }
    None
}

fn pattern_verdict(challenge: &Challenge, variable: &str, adjustments: &[Adjustment]) -> Vec<TestResult> {
    if !adjustments.contains(&Adjustment::Decrement) {
        return vec![TestResult::fault(
            SubmissionFault::LoopNotFixed,
            ResultKind::Failure,
            SubmissionFault::LoopNotFixed.to_string(),
            format!(
                "The function doesn't modify '{variable}' inside the loop, so the loop condition will always be true."
            ),
            format!("Add a statement inside the while loop that decreases the value of '{variable}'."),
            format!("Try adding '{variable} -= 1' inside the while loop, after the print statement."),
        )];
    }
    challenge
        .test_cases
        .iter()
        .enumerate()
        .map(|(i, case)| {
            let mut result = TestResult::success(
                format!("Test {}: ✅ {}", i + 1, case.description),
                Some(case.explanation.clone()),
            );
            result.suggestion = Some(format!(
                "Great debugging! The loop now properly decrements '{variable}' each iteration."
            ));
            result
        })
        .collect()
}

fn syntax_result(err: &ScriptError) -> TestResult {
    TestResult::fault(
        SubmissionFault::Syntax,
        ResultKind::Syntax,
        SubmissionFault::Syntax.to_string(),
        err.to_string(),
        "Check your Python syntax. Make sure indentation is correct and all statements are valid.",
        "Look for missing colons, incorrect indentation, or typos in your code.",
    )
}

fn iteration_limit(challenge: &Challenge, label: &str, err: &ScriptError) -> TestResult {
    let hint = match &challenge.check {
        ChallengeCheck::LoopFix { variable } => {
            format!("Add a statement inside the while loop that decreases the value of '{variable}'.")
        }
        ChallengeCheck::Execute => {
            "A loop never finishes. Make sure its condition eventually becomes false.".to_string()
        }
    };
    TestResult::fault(
        SubmissionFault::IterationLimit,
        ResultKind::Error,
        format!("{label}: ❌ {}", SubmissionFault::IterationLimit),
        err.to_string(),
        hint,
        "Check every while loop for a statement that moves it toward its exit condition.",
    )
}

fn case_args(case: &TestCase) -> Result<Vec<Value>, ScriptError> {
    match &case.input {
        serde_json::Value::Array(items) => items.iter().map(Value::from_json).collect(),
        single => Ok(vec![Value::from_json(single)?]),
    }
}

fn run_case(
    loaded: &Interpreter,
    def: &Rc<FunctionDef>,
    challenge: &Challenge,
    number: usize,
    case: &TestCase,
) -> TestResult {
    // Each vector gets its own copy so globals mutated by one test can't leak
    let mut interp = loaded.clone();
    let outcome = case_args(case).and_then(|args| interp.invoke(def, args));
    let output = interp.take_output();

    let result = match outcome {
        Ok(value) if value.matches_json(&case.expected) => TestResult::success(
            format!("Test {number}: ✅ {}", case.description),
            Some(case.explanation.clone()),
        ),
        Ok(value) => TestResult::fault(
            SubmissionFault::LogicFailure,
            ResultKind::Failure,
            format!("Test {number}: ❌ {}", case.description),
            format!("Expected: {}, Got: {}", case.expected, value.to_json()),
            "Check your logic and try again.",
            case.explanation.clone(),
        ),
        Err(err @ ScriptError::StepLimit { .. }) => {
            iteration_limit(challenge, &format!("Test {number}"), &err)
        }
        Err(err) => TestResult::fault(
            SubmissionFault::Runtime,
            ResultKind::Error,
            format!("Test {number}: ❌ {}", SubmissionFault::Runtime),
            err.to_string(),
            "Check for syntax errors, undefined variables, or logic issues.",
            "Review your code for typos, missing variables, or incorrect syntax.",
        ),
    };
    result.with_output(output)
}
