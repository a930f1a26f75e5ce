//! Challenge catalog
//!
//! The bundled exercises. Built once at startup and shared read-only with the
//! engine; challenge tiles on the grid refer to entries by round-robin index.

use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};

/// How hard an exercise is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Junior,
    Mid,
    Senior,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Junior => "Junior",
            Difficulty::Mid => "Mid",
            Difficulty::Senior => "Senior",
        }
    }
}

/// What kind of exercise it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Algorithm,
    Debug,
    Optimize,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Algorithm => "Algorithm",
            Category::Debug => "Debug",
            Category::Optimize => "Optimize",
        }
    }
}

/// How a submission for this challenge is checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeCheck {
    /// Run the submission against every test case
    Execute,
    /// Infinite-loop repair exercise; `variable` is the loop control variable
    LoopFix { variable: String },
}

/// One test vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Arguments; an array is spread positionally, anything else is passed as one argument
    pub input: Json,
    pub expected: Json,
    pub description: String,
    pub explanation: String,
}

impl TestCase {
    fn new(input: Json, expected: Json, description: &str, explanation: &str) -> Self {
        Self {
            input,
            expected,
            description: description.to_string(),
            explanation: explanation.to_string(),
        }
    }
}

/// A coding exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: Category,
    pub language: String,
    /// Name of the function the tests call
    pub entry_point: String,
    pub template: String,
    pub solution: String,
    pub test_cases: Vec<TestCase>,
    pub points: u32,
    pub hints: Vec<String>,
    pub learning_objectives: Vec<String>,
    pub common_mistakes: Vec<String>,
    pub check: ChallengeCheck,
}

/// Read-only registry of all challenges
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    challenges: Vec<Challenge>,
}

impl Catalog {
    /// Build a catalog from explicit entries. Returns None if `challenges` is empty.
    pub fn new(challenges: Vec<Challenge>) -> Option<Self> {
        if challenges.is_empty() {
            return None;
        }
        Some(Self { challenges })
    }

    /// The exercises that ship with the game
    pub fn builtin() -> Self {
        let challenges = vec![array_sum(), find_bug(), list_comprehension()];
        log::info!("Loaded {} challenges", challenges.len());
        Self { challenges }
    }

    pub fn all(&self) -> &[Challenge] {
        &self.challenges
    }

    /// Round-robin lookup, so any number of grid slots maps onto the catalog
    pub fn by_index(&self, index: usize) -> &Challenge {
        &self.challenges[index % self.challenges.len()]
    }

    pub fn by_id(&self, id: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn array_sum() -> Challenge {
    Challenge {
        id: "array-sum".into(),
        title: "Array Sum Algorithm".into(),
        description: "Calculate the total sum of all numbers in a list. This fundamental \
                      operation is used in data analysis, statistics, and many algorithms."
            .into(),
        difficulty: Difficulty::Junior,
        category: Category::Algorithm,
        language: "python".into(),
        entry_point: "array_sum".into(),
        template: r#"def array_sum(numbers):
  """
  Calculate the sum of all numbers in a list.

  Args:
      numbers (list): A list of integers or floats

  Returns:
      int/float: The sum of all numbers in the list

  Examples:
      array_sum([1, 2, 3]) -> 6
      array_sum([]) -> 0
      array_sum([-1, 1]) -> 0
  """
  # TODO: Implement the function
  # Hint: You can use a loop or Python's built-in sum() function
  pass"#
            .into(),
        solution: r#"def array_sum(numbers):
  """Calculate the sum of all numbers in a list."""
  return sum(numbers)"#
            .into(),
        test_cases: vec![
            TestCase::new(
                json!([[1, 2, 3, 4]]),
                json!(10),
                "Sum of positive integers [1, 2, 3, 4]",
                "1 + 2 + 3 + 4 = 10",
            ),
            TestCase::new(
                json!([[0, -1, 5]]),
                json!(4),
                "Sum with negative numbers [0, -1, 5]",
                "0 + (-1) + 5 = 4",
            ),
            TestCase::new(
                json!([[]]),
                json!(0),
                "Empty list should return 0",
                "Sum of no numbers is 0 by definition",
            ),
            TestCase::new(
                json!([[42]]),
                json!(42),
                "Single element list [42]",
                "Sum of one number is the number itself",
            ),
            TestCase::new(
                json!([[-5, -10, -3]]),
                json!(-18),
                "All negative numbers [-5, -10, -3]",
                "(-5) + (-10) + (-3) = -18",
            ),
        ],
        points: 100,
        hints: strings(&[
            "Python has a built-in sum() function that can add all numbers in a list",
            "Alternative: Use a for loop with a running total: total = 0; for num in numbers: total += num",
            "Remember that sum([]) returns 0, which handles the empty list case automatically",
            "The sum() function works with both integers and floating-point numbers",
        ]),
        learning_objectives: strings(&[
            "Understand list iteration and aggregation",
            "Learn about Python's built-in functions",
            "Practice handling edge cases (empty lists)",
        ]),
        common_mistakes: strings(&[
            "Forgetting to handle empty lists",
            "Not returning the result",
            "Using incorrect variable names",
        ]),
        check: ChallengeCheck::Execute,
    }
}

fn find_bug() -> Challenge {
    Challenge {
        id: "find-bug".into(),
        title: "Debug the Infinite Loop".into(),
        description: "Fix a common programming bug that causes an infinite loop. This teaches \
                      the importance of loop control variables and debugging skills."
            .into(),
        difficulty: Difficulty::Mid,
        category: Category::Debug,
        language: "python".into(),
        entry_point: "count_down".into(),
        template: r#"def count_down(n):
  """
  Count down from n to 1, printing each number.

  Args:
      n (int): Starting number for countdown

  Returns:
      str: "Done!" when countdown is complete

  Examples:
      count_down(3) prints: 3, 2, 1 and returns "Done!"
      count_down(0) returns "Done!" immediately
  """
  while n > 0:
      print(n)
      # BUG: What's missing here to prevent infinite loop?
  return "Done!""#
            .into(),
        solution: r#"def count_down(n):
  """Count down from n to 1, printing each number."""
  while n > 0:
      print(n)
      n -= 1  # Fixed: decrement n to eventually exit the loop
  return "Done!""#
            .into(),
        test_cases: vec![
            TestCase::new(
                json!([3]),
                json!("Done!"),
                "Countdown from 3",
                "Should print 3, 2, 1 then return 'Done!'",
            ),
            TestCase::new(
                json!([1]),
                json!("Done!"),
                "Countdown from 1",
                "Should print 1 then return 'Done!'",
            ),
            TestCase::new(
                json!([0]),
                json!("Done!"),
                "No countdown needed for 0",
                "Loop condition n > 0 is false, so skip loop",
            ),
        ],
        points: 200,
        hints: strings(&[
            "Look at the while loop condition: 'while n > 0'. What makes this condition eventually become false?",
            "The variable 'n' needs to change inside the loop, otherwise the condition 'n > 0' will always be true",
            "Add 'n -= 1' (or 'n = n - 1') inside the while loop to decrement n each iteration",
            "This is a classic infinite loop bug - the loop control variable isn't being modified",
        ]),
        learning_objectives: strings(&[
            "Understand loop control variables",
            "Learn to identify and fix infinite loops",
            "Practice debugging systematic thinking",
        ]),
        common_mistakes: strings(&[
            "Not modifying the loop control variable",
            "Incrementing instead of decrementing",
            "Placing the decrement outside the loop",
        ]),
        check: ChallengeCheck::LoopFix {
            variable: "n".into(),
        },
    }
}

fn list_comprehension() -> Challenge {
    Challenge {
        id: "list-comprehension".into(),
        title: "List Comprehension Mastery".into(),
        description: "Create an elegant one-liner using Python's list comprehension to filter \
                      and transform data. This is a powerful Pythonic pattern."
            .into(),
        difficulty: Difficulty::Senior,
        category: Category::Algorithm,
        language: "python".into(),
        entry_point: "even_squares".into(),
        template: r#"def even_squares(n):
  """
  Generate a list of squares for all even numbers from 0 to n (inclusive).

  Args:
      n (int): Upper limit (inclusive)

  Returns:
      list: Squares of even numbers from 0 to n

  Examples:
      even_squares(5) -> [0, 4, 16]  # squares of 0, 2, 4
      even_squares(8) -> [0, 4, 16, 36, 64]  # squares of 0, 2, 4, 6, 8
      even_squares(1) -> [0]  # only 0 is even from 0 to 1
  """
  # TODO: Use list comprehension to solve this in one line
  # Pattern: [expression for item in iterable if condition]
  # You need: square the number, iterate through range, filter for even
  pass"#
            .into(),
        solution: r#"def even_squares(n):
  """Generate squares of even numbers from 0 to n using list comprehension."""
  return [x**2 for x in range(n+1) if x % 2 == 0]"#
            .into(),
        test_cases: vec![
            TestCase::new(
                json!([5]),
                json!([0, 4, 16]),
                "Even squares from 0 to 5: [0², 2², 4²]",
                "Even numbers 0,2,4 squared give 0,4,16",
            ),
            TestCase::new(
                json!([8]),
                json!([0, 4, 16, 36, 64]),
                "Even squares from 0 to 8: [0², 2², 4², 6², 8²]",
                "Even numbers 0,2,4,6,8 squared give 0,4,16,36,64",
            ),
            TestCase::new(
                json!([0]),
                json!([0]),
                "Only 0 is even from 0 to 0",
                "Range is just [0], 0 is even, 0² = 0",
            ),
            TestCase::new(
                json!([1]),
                json!([0]),
                "Only 0 is even from 0 to 1",
                "Range is [0,1], only 0 is even, 0² = 0",
            ),
            TestCase::new(
                json!([10]),
                json!([0, 4, 16, 36, 64, 100]),
                "Even squares from 0 to 10",
                "Even numbers 0,2,4,6,8,10 squared",
            ),
        ],
        points: 300,
        hints: strings(&[
            "List comprehension syntax: [expression for item in iterable if condition]",
            "You need three parts: x**2 (square), range(n+1) (numbers 0 to n), x % 2 == 0 (even check)",
            "Remember range(n+1) to include n in the range (range is exclusive of the end)",
            "The modulo operator % checks divisibility: x % 2 == 0 means x is even",
            "Complete solution: [x**2 for x in range(n+1) if x % 2 == 0]",
        ]),
        learning_objectives: strings(&[
            "Master Python list comprehensions",
            "Understand filtering with conditions",
            "Practice mathematical operations in functional style",
        ]),
        common_mistakes: strings(&[
            "Using range(n) instead of range(n+1)",
            "Forgetting the condition 'if x % 2 == 0'",
            "Using x*x instead of x**2 (both work, but ** is more Pythonic)",
        ]),
        check: ChallengeCheck::Execute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_order() {
        let catalog = Catalog::builtin();
        let ids: Vec<_> = catalog.all().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["array-sum", "find-bug", "list-comprehension"]);
    }

    #[test]
    fn test_by_index_wraps() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.by_index(0).id, "array-sum");
        assert_eq!(catalog.by_index(3).id, "array-sum");
        assert_eq!(catalog.by_index(5).id, "list-comprehension");
    }

    #[test]
    fn test_by_id() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.by_id("find-bug").map(|c| c.points), Some(200));
        assert!(catalog.by_id("nope").is_none());
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(Catalog::new(Vec::new()).is_none());
    }

    #[test]
    fn test_entries_are_complete() {
        for challenge in Catalog::builtin().all() {
            assert!(!challenge.test_cases.is_empty(), "{}", challenge.id);
            assert!(!challenge.hints.is_empty(), "{}", challenge.id);
            assert!(challenge.template.contains(&challenge.entry_point));
            assert!(challenge.solution.contains(&challenge.entry_point));
        }
    }
}
