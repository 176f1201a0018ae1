// Copyright 2026 The opal developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! DOS-style wildcard matching for directory searches.
//!
//! `*` matches any run of characters including `.`; `?` matches exactly one
//! character other than `.`. A pattern with no `.` gets one appended, and
//! names are matched in their search form (a trailing `.` when the name has
//! no extension), so `*` still matches extension-less names. Matching is
//! anchored, case-insensitive and culture-invariant.

fn fold(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

fn search_form(s: &str) -> Vec<char> {
    let mut chars: Vec<char> = s.chars().map(fold).collect();
    if !chars.contains(&'.') {
        chars.push('.');
    }
    chars
}

pub fn matches(pattern: &str, name: &str) -> bool {
    let pattern = search_form(pattern);
    let name = search_form(name);

    // Iterative glob with single-star backtracking.
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ni < name.len() {
        if pi < pattern.len() {
            match pattern[pi] {
                '*' => {
                    star = Some((pi, ni));
                    pi += 1;
                    continue;
                }
                '?' if name[ni] != '.' => {
                    pi += 1;
                    ni += 1;
                    continue;
                }
                c if c == name[ni] => {
                    pi += 1;
                    ni += 1;
                    continue;
                }
                _ => {}
            }
        }
        match star {
            Some((star_pi, star_ni)) => {
                pi = star_pi + 1;
                ni = star_ni + 1;
                star = Some((star_pi, star_ni + 1));
            }
            None => return false,
        }
    }
    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

/// Whether every name matches, making the filter a no-op.
pub fn matches_all(pattern: &str) -> bool {
    pattern == "*" || pattern == "*.*"
}
