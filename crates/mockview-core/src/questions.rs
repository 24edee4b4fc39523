// Built-in question bank and difficulty/topic filtering.

use serde_json::json;

use crate::model::{Difficulty, Question, QuestionTest};

/// A bank question together with the hints dispensed for it, in order.
/// Hints are kept out of [`Question`] so they never reach the client with
/// the session payload.
#[derive(Debug, Clone)]
pub struct BankEntry {
    pub question: Question,
    pub hints: Vec<String>,
}

/// Fixed collection of interview questions.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    entries: Vec<BankEntry>,
}

impl QuestionBank {
    pub fn new(entries: Vec<BankEntry>) -> Self {
        QuestionBank { entries }
    }

    /// The questions shipped with the service.
    pub fn builtin() -> Self {
        QuestionBank::new(builtin_entries())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BankEntry] {
        &self.entries
    }

    /// Entries matching both filters. A `None` or blank filter matches
    /// everything; comparisons ignore case.
    pub fn matching(&self, difficulty: Option<&str>, topic: Option<&str>) -> Vec<&BankEntry> {
        let difficulty = difficulty.map(str::trim).filter(|d| !d.is_empty());
        let topic = topic.map(str::trim).filter(|t| !t.is_empty());

        self.entries
            .iter()
            .filter(|e| {
                difficulty.map_or(true, |d| e.question.difficulty.as_str().eq_ignore_ascii_case(d))
            })
            .filter(|e| topic.map_or(true, |t| e.question.topic.eq_ignore_ascii_case(t)))
            .collect()
    }

    /// Like [`matching`](Self::matching), but falls back to the whole bank
    /// when nothing matches.
    pub fn candidates(&self, difficulty: Option<&str>, topic: Option<&str>) -> Vec<&BankEntry> {
        let matched = self.matching(difficulty, topic);
        if matched.is_empty() {
            self.entries.iter().collect()
        } else {
            matched
        }
    }

    /// Hints for the question with the given title, empty if unknown.
    pub fn hints_for(&self, title: &str) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.question.title == title)
            .map(|e| e.hints.as_slice())
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Built-in content
// ---------------------------------------------------------------------------

struct QuestionDef<'a> {
    title: &'a str,
    prompt: &'a str,
    difficulty: Difficulty,
    topic: &'a str,
    function_name: &'a str,
    params: &'a str,
    tests: Vec<(serde_json::Value, serde_json::Value)>,
    hints: &'a [&'a str],
}

fn entry(def: QuestionDef<'_>) -> BankEntry {
    let starter_code = format!(
        "function {}({}) {{\n  // Write your solution here\n}}\n",
        def.function_name, def.params
    );
    BankEntry {
        question: Question {
            title: def.title.to_string(),
            prompt: def.prompt.to_string(),
            difficulty: def.difficulty,
            topic: def.topic.to_string(),
            kind: "coding".to_string(),
            function_name: def.function_name.to_string(),
            starter_code,
            tests: def
                .tests
                .into_iter()
                .map(|(input, expected)| QuestionTest { input, expected })
                .collect(),
        },
        hints: def.hints.iter().map(|h| h.to_string()).collect(),
    }
}

fn builtin_entries() -> Vec<BankEntry> {
    vec![
        // --- DSA / Easy ---
        entry(QuestionDef {
            title: "Two Sum",
            prompt: "Given an array of integers nums and an integer target, return the indices \
                     of the two numbers that add up to target. Each input has exactly one \
                     solution and you may not use the same element twice.",
            difficulty: Difficulty::Easy,
            topic: "DSA",
            function_name: "twoSum",
            params: "nums, target",
            tests: vec![
                (json!([[2, 7, 11, 15], 9]), json!([0, 1])),
                (json!([[3, 2, 4], 6]), json!([1, 2])),
                (json!([[3, 3], 6]), json!([0, 1])),
            ],
            hints: &[
                "A brute force pair check is O(n^2). Can you remember what you have already seen?",
                "Store each value's index in a hash map and look up target - value as you go.",
            ],
        }),
        entry(QuestionDef {
            title: "Valid Parentheses",
            prompt: "Given a string containing just the characters '(', ')', '{', '}', '[' and \
                     ']', determine if the input string is valid: every open bracket is closed \
                     by the same type of bracket in the correct order.",
            difficulty: Difficulty::Easy,
            topic: "DSA",
            function_name: "isValid",
            params: "s",
            tests: vec![
                (json!(["()"]), json!(true)),
                (json!(["()[]{}"]), json!(true)),
                (json!(["(]"]), json!(false)),
                (json!(["([)]"]), json!(false)),
            ],
            hints: &[
                "The most recently opened bracket must be the first one closed.",
                "Push opening brackets on a stack and pop when you see a closing one.",
            ],
        }),
        entry(QuestionDef {
            title: "Palindrome Number",
            prompt: "Given an integer x, return true if x reads the same backward as forward.",
            difficulty: Difficulty::Easy,
            topic: "DSA",
            function_name: "isPalindrome",
            params: "x",
            tests: vec![
                (json!([121]), json!(true)),
                (json!([-121]), json!(false)),
                (json!([10]), json!(false)),
            ],
            hints: &[
                "Negative numbers can never be palindromes.",
                "Reverse half of the digits arithmetically and compare with the other half.",
            ],
        }),
        // --- DSA / Medium ---
        entry(QuestionDef {
            title: "Longest Substring Without Repeating Characters",
            prompt: "Given a string s, find the length of the longest substring without \
                     repeating characters.",
            difficulty: Difficulty::Medium,
            topic: "DSA",
            function_name: "lengthOfLongestSubstring",
            params: "s",
            tests: vec![
                (json!(["abcabcbb"]), json!(3)),
                (json!(["bbbbb"]), json!(1)),
                (json!(["pwwkew"]), json!(3)),
                (json!([""]), json!(0)),
            ],
            hints: &[
                "Think of a window that only ever slides to the right.",
                "Track the last index of each character to jump the window start forward.",
            ],
        }),
        entry(QuestionDef {
            title: "Product of Array Except Self",
            prompt: "Given an integer array nums, return an array answer such that answer[i] is \
                     the product of all elements of nums except nums[i], without using division.",
            difficulty: Difficulty::Medium,
            topic: "DSA",
            function_name: "productExceptSelf",
            params: "nums",
            tests: vec![
                (json!([[1, 2, 3, 4]]), json!([24, 12, 8, 6])),
                (json!([[2, 3]]), json!([3, 2])),
            ],
            hints: &[
                "Each answer is (product of everything to the left) * (product to the right).",
                "Fill prefix products in one pass, then multiply by a running suffix product.",
            ],
        }),
        entry(QuestionDef {
            title: "Maximum Subarray",
            prompt: "Given an integer array nums, find the contiguous subarray with the largest \
                     sum and return its sum.",
            difficulty: Difficulty::Medium,
            topic: "DSA",
            function_name: "maxSubArray",
            params: "nums",
            tests: vec![
                (json!([[-2, 1, -3, 4, -1, 2, 1, -5, 4]]), json!(6)),
                (json!([[1]]), json!(1)),
                (json!([[5, 4, -1, 7, 8]]), json!(23)),
            ],
            hints: &[
                "A running sum that has gone negative can only hurt what comes next.",
                "Kadane's algorithm: best ending here = max(x, best ending before + x).",
            ],
        }),
        // --- DSA / Hard ---
        entry(QuestionDef {
            title: "Trapping Rain Water",
            prompt: "Given n non-negative integers representing an elevation map where the width \
                     of each bar is 1, compute how much water it can trap after raining.",
            difficulty: Difficulty::Hard,
            topic: "DSA",
            function_name: "trap",
            params: "height",
            tests: vec![
                (json!([[0, 1, 0, 2, 1, 0, 1, 3, 2, 1, 2, 1]]), json!(6)),
                (json!([[4, 2, 0, 3, 2, 5]]), json!(9)),
            ],
            hints: &[
                "Water above a bar is bounded by the smaller of the tallest bars on each side.",
                "Two pointers moving inward from the lower side avoid the extra arrays.",
            ],
        }),
        entry(QuestionDef {
            title: "Median of Two Sorted Arrays",
            prompt: "Given two sorted arrays nums1 and nums2, return the median of the two \
                     sorted arrays. Aim for O(log(m + n)).",
            difficulty: Difficulty::Hard,
            topic: "DSA",
            function_name: "findMedianSortedArrays",
            params: "nums1, nums2",
            tests: vec![
                (json!([[1, 3], [2]]), json!(2.0)),
                (json!([[1, 2], [3, 4]]), json!(2.5)),
            ],
            hints: &[
                "You do not need to merge: look for a partition of both arrays.",
                "Binary search the partition point of the shorter array.",
            ],
        }),
        // --- JavaScript / Easy ---
        entry(QuestionDef {
            title: "FizzBuzz",
            prompt: "Return an array of the numbers 1..n as strings, replacing multiples of 3 \
                     with \"Fizz\", multiples of 5 with \"Buzz\" and multiples of both with \
                     \"FizzBuzz\".",
            difficulty: Difficulty::Easy,
            topic: "JavaScript",
            function_name: "fizzBuzz",
            params: "n",
            tests: vec![
                (json!([3]), json!(["1", "2", "Fizz"])),
                (json!([5]), json!(["1", "2", "Fizz", "4", "Buzz"])),
                (
                    json!([15]),
                    json!([
                        "1", "2", "Fizz", "4", "Buzz", "Fizz", "7", "8", "Fizz", "Buzz", "11",
                        "Fizz", "13", "14", "FizzBuzz"
                    ]),
                ),
            ],
            hints: &[
                "Check the combined case before the individual ones.",
                "Array.from({ length: n }, (_, i) => ...) builds the result in one expression.",
            ],
        }),
        entry(QuestionDef {
            title: "Capitalize Words",
            prompt: "Given a sentence, return it with the first letter of every word upper-cased.",
            difficulty: Difficulty::Easy,
            topic: "JavaScript",
            function_name: "capitalizeWords",
            params: "sentence",
            tests: vec![
                (json!(["hello world"]), json!("Hello World")),
                (json!(["a"]), json!("A")),
                (json!([""]), json!("")),
            ],
            hints: &[
                "split(' ') and join(' ') keep the spacing intact.",
                "word.charAt(0).toUpperCase() + word.slice(1) handles empty words too.",
            ],
        }),
        // --- JavaScript / Medium ---
        entry(QuestionDef {
            title: "Flatten Nested Array",
            prompt: "Given an arbitrarily nested array, return a new flat array with all values \
                     in order, without using Array.prototype.flat.",
            difficulty: Difficulty::Medium,
            topic: "JavaScript",
            function_name: "flatten",
            params: "arr",
            tests: vec![
                (json!([[1, [2, [3, [4]], 5]]]), json!([1, 2, 3, 4, 5])),
                (json!([[]]), json!([])),
            ],
            hints: &[
                "Recursion mirrors the nesting directly.",
                "An explicit stack avoids recursion depth limits: pop, and push children back.",
            ],
        }),
        entry(QuestionDef {
            title: "Chunk Array",
            prompt: "Split an array into groups of the given size. The last chunk may be shorter.",
            difficulty: Difficulty::Medium,
            topic: "JavaScript",
            function_name: "chunk",
            params: "arr, size",
            tests: vec![
                (json!([[1, 2, 3, 4, 5], 2]), json!([[1, 2], [3, 4], [5]])),
                (json!([[1, 2, 3], 5]), json!([[1, 2, 3]])),
                (json!([[], 3]), json!([])),
            ],
            hints: &[
                "Step through the array size elements at a time.",
                "arr.slice(i, i + size) never runs past the end.",
            ],
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easy_dsa_titles() {
        let bank = QuestionBank::builtin();
        let mut titles: Vec<&str> = bank
            .matching(Some("Easy"), Some("DSA"))
            .iter()
            .map(|e| e.question.title.as_str())
            .collect();
        titles.sort_unstable();
        assert_eq!(titles, vec!["Palindrome Number", "Two Sum", "Valid Parentheses"]);
    }

    #[test]
    fn filters_ignore_case_and_blank() {
        let bank = QuestionBank::builtin();
        assert_eq!(bank.matching(Some("easy"), Some("dsa")).len(), 3);
        assert_eq!(bank.matching(Some(""), None).len(), bank.len());
        assert_eq!(bank.matching(None, Some("javascript")).len(), 4);
    }

    #[test]
    fn candidates_fall_back_to_whole_bank() {
        let bank = QuestionBank::builtin();
        assert!(bank.matching(Some("Hard"), Some("JavaScript")).is_empty());
        assert_eq!(bank.candidates(Some("Hard"), Some("JavaScript")).len(), bank.len());
        assert_eq!(bank.candidates(Some("Nope"), None).len(), bank.len());
    }

    #[test]
    fn every_question_is_well_formed() {
        let bank = QuestionBank::builtin();
        assert!(!bank.is_empty());
        for e in bank.entries() {
            let q = &e.question;
            assert!(!q.tests.is_empty(), "{} has no tests", q.title);
            assert!(!e.hints.is_empty(), "{} has no hints", q.title);
            assert!(q.starter_code.contains(&q.function_name));
            assert_eq!(q.kind, "coding");
            for t in &q.tests {
                assert!(t.input.is_array(), "{} test input must be an argument list", q.title);
            }
        }
    }

    #[test]
    fn hints_for_unknown_title_is_empty() {
        let bank = QuestionBank::builtin();
        assert_eq!(bank.hints_for("Two Sum").len(), 2);
        assert!(bank.hints_for("Nonexistent").is_empty());
    }
}
