use super::continuity::ContinuityFixer;
use super::Source;
use crate::config;
use crate::error::{Result, TsError};
use crate::format::ts::TsPacket;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashSet;

/// Decides whether an exhausted entry loops back. Receives the 1-based
/// iteration count of the entry.
pub type LoopPredicate = Box<dyn FnMut(u32) -> bool + Send>;

/// Implicit mark of the first entry when none was declared before it.
const START_MARK: &str = "start";

struct ProgramEntry {
    source: Box<dyn Source>,
    loop_test: Option<LoopPredicate>,
    loop_to: usize,
    loop_count: u32,
}

impl ProgramEntry {
    /// Consults the loop predicate for the current iteration. The counter
    /// restarts once the entry is allowed to move on.
    fn test_loop(&mut self) -> bool {
        let Some(test) = self.loop_test.as_mut() else {
            return false;
        };
        if test(self.loop_count) {
            self.loop_count += 1;
            true
        } else {
            self.loop_count = 1;
            false
        }
    }
}

/// Plays an ordered list of sources end to end, looping back to marked
/// entries as their predicates allow.
///
/// Built through [`ProgramSource::builder`], which validates marks and loop
/// ranges before any packet flows.
pub struct ProgramSource {
    entries: Vec<ProgramEntry>,
    current: Option<usize>,
    fixer: Option<ContinuityFixer>,
    /// Packets delivered since the last loop back
    delivered: u64,
    closed: bool,
}

impl ProgramSource {
    /// Starts an empty program configuration.
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::new()
    }

    /// Index of the entry currently playing, `None` once finished.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for a program without entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn next_source(&mut self, idx: usize) {
        if let Some(fixer) = self.fixer.as_mut() {
            fixer.next_source();
        }

        let entry = &mut self.entries[idx];
        let mut looping = entry.test_loop();
        if looping && self.delivered == 0 {
            warn!(
                "Loop range ending at source #{} produced no packets, not looping",
                idx
            );
            entry.loop_count = 1;
            looping = false;
        }

        if looping {
            let loop_to = entry.loop_to;
            for i in loop_to..=idx {
                match self.entries[i].source.as_resettable() {
                    Some(source) => {
                        if let Err(e) = source.reset().await {
                            warn!("Error resetting source #{}: {}", i, e);
                        }
                    }
                    None => warn!("Source #{} cannot be reset", i),
                }
            }
            self.delivered = 0;
            self.current = Some(loop_to);
            info!("Looped back to source #{}", loop_to);
        } else if idx + 1 < self.entries.len() {
            self.current = Some(idx + 1);
            info!("Switched to source #{}", idx + 1);
        } else {
            self.current = None;
            info!("Program finished");
        }
    }
}

#[async_trait]
impl Source for ProgramSource {
    async fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        while let Some(idx) = self.current {
            match self.entries[idx].source.next_packet().await? {
                Some(mut packet) => {
                    if let Some(fixer) = self.fixer.as_mut() {
                        fixer.fix_continuity(&mut packet);
                    }
                    self.delivered += 1;
                    return Ok(Some(packet));
                }
                None => self.next_source(idx).await,
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if let Err(e) = entry.source.close().await {
                warn!("Error closing source #{}: {}", i, e);
            }
        }
        Ok(())
    }
}

enum LoopTarget {
    /// Most recently declared mark not yet claimed by another loop
    Innermost,
    Named(String),
}

struct LoopSpec {
    target: LoopTarget,
    test: LoopPredicate,
}

struct EntrySpec {
    source: Box<dyn Source>,
    mark: Option<String>,
    loop_spec: Option<LoopSpec>,
}

/// Ordered configuration of a [`ProgramSource`].
///
/// Calls only record intent; [`ProgramBuilder::build`] resolves marks to
/// indices and reports every configuration problem in one place.
pub struct ProgramBuilder {
    entries: Vec<EntrySpec>,
    pending_mark: Option<String>,
    fix_continuity: bool,
    errors: Vec<String>,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    /// Empty program. Continuity fixing defaults to the configured value.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            pending_mark: None,
            fix_continuity: config::get_fix_continuity(),
            errors: Vec::new(),
        }
    }

    /// Names the next added source as a loop target.
    pub fn mark(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if let Some(previous) = self.pending_mark.replace(name) {
            self.errors
                .push(format!("Mark '{}' is not attached to any source", previous));
        }
        self
    }

    /// Appends a source, attaching any pending mark to it.
    pub fn add_source<S: Source + 'static>(self, source: S) -> Self {
        self.add_boxed(Box::new(source))
    }

    /// Same as [`ProgramBuilder::add_source`] for an already boxed source.
    pub fn add_boxed(mut self, source: Box<dyn Source>) -> Self {
        let mut mark = self.pending_mark.take();
        if mark.is_none() && self.entries.is_empty() {
            mark = Some(START_MARK.to_string());
        }
        self.entries.push(EntrySpec {
            source,
            mark,
            loop_spec: None,
        });
        self
    }

    /// Appends several sources in order.
    pub fn add_sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Source>>,
    {
        for source in sources {
            self = self.add_boxed(source);
        }
        self
    }

    /// Rewrites continuity counters so they run on across source boundaries.
    pub fn fix_continuity(mut self, fix_continuity: bool) -> Self {
        self.fix_continuity = fix_continuity;
        self
    }

    /// Loops the last added source back to the innermost open mark forever.
    pub fn loop_back(self) -> Self {
        self.set_loop(LoopTarget::Innermost, Box::new(|_| true))
    }

    /// Loops the last added source back to `mark` forever.
    pub fn loop_back_to(self, mark: impl Into<String>) -> Self {
        self.set_loop(LoopTarget::Named(mark.into()), Box::new(|_| true))
    }

    /// Replays the range from the innermost open mark `count` times.
    pub fn loops(self, count: u32) -> Self {
        self.set_loop(LoopTarget::Innermost, Box::new(move |n| n <= count))
    }

    /// Replays the range from `mark` `count` times.
    pub fn loops_to(self, mark: impl Into<String>, count: u32) -> Self {
        self.set_loop(LoopTarget::Named(mark.into()), Box::new(move |n| n <= count))
    }

    /// Loops back to the innermost open mark while `test(iteration)` holds.
    pub fn loop_if<F>(self, test: F) -> Self
    where
        F: FnMut(u32) -> bool + Send + 'static,
    {
        self.set_loop(LoopTarget::Innermost, Box::new(test))
    }

    /// Loops back to `mark` while `test(iteration)` holds.
    pub fn loop_to_if<F>(self, mark: impl Into<String>, test: F) -> Self
    where
        F: FnMut(u32) -> bool + Send + 'static,
    {
        self.set_loop(LoopTarget::Named(mark.into()), Box::new(test))
    }

    /// Removes any loop from the last added source.
    pub fn no_loop(mut self) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.loop_spec = None;
        }
        self
    }

    fn set_loop(mut self, target: LoopTarget, test: LoopPredicate) -> Self {
        match self.entries.last_mut() {
            Some(entry) => entry.loop_spec = Some(LoopSpec { target, test }),
            None => self
                .errors
                .push("Loop declared before any source".to_string()),
        }
        self
    }

    /// Resolves marks and validates loops.
    ///
    /// Fails on unattached or duplicate marks, unresolved loop targets and
    /// non-resettable sources inside a loop range.
    pub fn build(self) -> Result<ProgramSource> {
        let mut errors = self.errors;
        if let Some(mark) = &self.pending_mark {
            errors.push(format!("Mark '{}' is not attached to any source", mark));
        }
        if self.entries.is_empty() {
            errors.push("Program must contain at least one source".to_string());
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if let Some(mark) = &entry.mark {
                if !seen.insert(mark.as_str()) {
                    errors.push(format!("Duplicate mark: {}", mark));
                }
            }
        }
        if !errors.is_empty() {
            return Err(TsError::Config(errors.join("; ")));
        }

        let marks: Vec<Option<String>> = self.entries.iter().map(|e| e.mark.clone()).collect();
        let mut open_marks: Vec<usize> = Vec::new();
        let mut entries = Vec::with_capacity(self.entries.len());

        for (index, mut spec) in self.entries.into_iter().enumerate() {
            if spec.mark.is_some() {
                open_marks.push(index);
            }

            let mut loop_to = index;
            let mut loop_test = None;
            if let Some(LoopSpec { target, test }) = spec.loop_spec.take() {
                loop_to = match target {
                    LoopTarget::Innermost => open_marks.pop(),
                    LoopTarget::Named(name) => marks[..=index]
                        .iter()
                        .position(|m| m.as_deref() == Some(name.as_str())),
                }
                .ok_or_else(|| {
                    TsError::Config(format!("Mark not found for loop on source #{}", index))
                })?;

                for i in loop_to..=index {
                    let resettable = if i == index {
                        spec.source.as_resettable().is_some()
                    } else {
                        entries
                            .get_mut(i)
                            .is_some_and(|e: &mut ProgramEntry| e.source.as_resettable().is_some())
                    };
                    if !resettable {
                        return Err(TsError::Config(format!(
                            "Source #{} must be resettable for looping",
                            i
                        )));
                    }
                }
                loop_test = Some(test);
            }

            entries.push(ProgramEntry {
                source: spec.source,
                loop_test,
                loop_to,
                loop_count: 1,
            });
        }

        debug!(
            "Built program with {} sources (fix continuity: {})",
            entries.len(),
            self.fix_continuity
        );
        Ok(ProgramSource {
            entries,
            current: Some(0),
            fixer: self.fix_continuity.then(ContinuityFixer::new),
            delivered: 0,
            closed: false,
        })
    }
}
