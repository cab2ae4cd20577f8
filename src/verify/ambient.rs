// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Names a generated test may use without declaring or importing them

use crate::project::TestFramework;

/// Bumped whenever the global lists change
pub const AMBIENT_VERSION: u32 = 1;

const VITEST_GLOBALS: &[&str] = &[
    "describe", "it", "test", "expect", "vi", "beforeEach", "afterEach", "beforeAll",
    "afterAll", "suite", "bench",
];

const JEST_GLOBALS: &[&str] = &[
    "describe", "it", "test", "expect", "jest", "beforeEach", "afterEach", "beforeAll",
    "afterAll", "fit", "xit", "xdescribe", "xtest", "fdescribe",
];

/// Runtime globals of browsers, Node and the language itself
const RUNTIME_GLOBALS: &[&str] = &[
    "AbortController", "Array", "ArrayBuffer", "BigInt", "Blob", "Boolean", "Buffer",
    "CustomEvent", "DataView", "Date", "Error", "Event", "EventTarget", "File", "FormData",
    "Function", "Headers", "HTMLElement", "Intl", "JSON", "Map", "Math", "Number", "Object",
    "Promise", "Proxy", "RangeError", "Reflect", "RegExp", "Request", "Response", "Set",
    "String", "Symbol", "SyntaxError", "TextDecoder", "TextEncoder", "TypeError", "URL",
    "URLSearchParams", "Uint8Array", "WeakMap", "WeakSet", "atob", "btoa",
    "cancelAnimationFrame", "clearInterval", "clearTimeout", "console", "crypto",
    "decodeURIComponent", "document", "encodeURIComponent", "eval", "fetch", "globalThis",
    "isFinite", "isNaN", "localStorage", "navigator", "parseFloat", "parseInt", "performance",
    "process", "queueMicrotask", "requestAnimationFrame", "require", "sessionStorage",
    "setInterval", "setTimeout", "structuredClone", "window",
];

/// Versioned set of ambient declarations handed to the verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientEnvironment {
    pub version: u32,
    pub framework: TestFramework,
    pub globals: Vec<&'static str>,
}

impl AmbientEnvironment {
    pub fn for_framework(framework: TestFramework) -> Self {
        let framework_globals = match framework {
            TestFramework::Vitest => VITEST_GLOBALS,
            TestFramework::Jest => JEST_GLOBALS,
        };
        let mut globals: Vec<&'static str> = framework_globals
            .iter()
            .chain(RUNTIME_GLOBALS.iter())
            .copied()
            .collect();
        globals.sort_unstable();
        globals.dedup();

        Self {
            version: AMBIENT_VERSION,
            framework,
            globals,
        }
    }

    /// Whether `name` is provided by the environment
    pub fn declares(&self, name: &str) -> bool {
        self.globals.binary_search_by(|g| (*g).cmp(name)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vitest_environment() {
        let env = AmbientEnvironment::for_framework(TestFramework::Vitest);
        assert_eq!(env.version, AMBIENT_VERSION);
        assert!(env.declares("vi"));
        assert!(env.declares("expect"));
        assert!(env.declares("Promise"));
        assert!(!env.declares("jest"));
        assert!(!env.declares("render"));
    }

    #[test]
    fn test_jest_environment() {
        let env = AmbientEnvironment::for_framework(TestFramework::Jest);
        assert!(env.declares("jest"));
        assert!(env.declares("xit"));
        assert!(!env.declares("vi"));
    }
}
