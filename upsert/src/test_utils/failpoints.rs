use fail::FailScenario;

/// Failpoints enabled for the lifetime of a test.
///
/// Holding the scenario serializes tests that use failpoints. Every configured failpoint
/// is removed again on drop, also when the test panics.
pub struct FailpointScenario<'a> {
    _scenario: FailScenario<'a>,
    names: Vec<String>,
}

impl<'a> FailpointScenario<'a> {
    /// Enables each `(name, action)` pair, `action` using the `fail` crate syntax such as
    /// `"return"` or `"1*return(conflict)"`.
    pub fn enable(failpoints: &[(&str, &str)]) -> FailpointScenario<'a> {
        let scenario = FailScenario::setup();

        let mut names = Vec::with_capacity(failpoints.len());
        for (name, action) in failpoints {
            fail::cfg(*name, action).unwrap();
            names.push(name.to_string());
        }

        Self {
            _scenario: scenario,
            names,
        }
    }
}

impl Drop for FailpointScenario<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            fail::remove(name);
        }
    }
}
