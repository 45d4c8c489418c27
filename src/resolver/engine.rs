// src/resolver/engine.rs

//! Iterative atom resolution engine
//!
//! The engine never looks packages up itself. It hands out one unresolved
//! atom at a time from [`ResolutionEngine::next_unresolved_atom`], and the
//! caller answers with [`ResolutionEngine::satisfy_atom`] (a candidate list)
//! or [`ResolutionEngine::unsatisfiable_atom`].
//!
//! Search state:
//! - frames live in an arena (`Vec<Frame>`) and name their parent by index
//! - each search stack is a path of frame ids from a root (or a requeued
//!   atom) down to the atom being expanded
//! - every tracked atom owns a [`ChoicePoint`]; the current branch of that
//!   choice point is the list of atoms it depends on
//! - `dependents` counts who needs each atom (the root marker or another
//!   atom), so an atom is dropped once nothing refers to it
//!
//! A dependency that points back at an atom still being expanded on the
//! current path is a cycle. The back-edge is recorded as a [`CycleBreak`]
//! and treated as satisfied by the in-progress ancestor; it is never pushed
//! again, so cycles cannot make the search loop.

use super::choice_point::ChoicePoint;
use super::conflict::{Conflict, CycleBreak};
use super::pigeonholes::{Occupant, SlotRegistry};
use crate::atom::{Atom, Matchable};
use crate::error::{Error, Result};
use crate::observer::SharedObserver;
use crate::package::Package;
use std::collections::{HashMap, HashSet, VecDeque};
use std::mem;
use std::sync::Arc;
use tracing::{debug, trace};

/// Index into the frame arena
pub type FrameId = usize;

#[derive(Debug)]
struct Frame {
    atom: Atom,
    parent: Option<FrameId>,
}

#[derive(Debug, Default)]
struct SearchStack {
    frames: Vec<FrameId>,
}

/// Who needs an atom
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependent {
    /// Requested directly by the caller
    Root,
    /// Required by the current choice of another atom
    Atom(Atom),
}

/// Lifecycle of an atom inside the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomStatus {
    /// Has a choice, dependencies may still be unexpanded
    Pending,
    /// Every dependency of the current choice is tracked
    Complete,
    /// Exhausted every candidate
    Unsatisfiable,
}

#[derive(Debug)]
struct AtomState {
    choices: ChoicePoint,
    /// Package placed in the slot registry for the current choice
    held: Option<Arc<Package>>,
    limiters: Vec<Arc<Atom>>,
    /// Non-blocker atoms of the current branch, registered as dependencies
    links: Vec<Atom>,
    complete: bool,
    /// Why earlier candidates were rejected
    rejections: Vec<String>,
}

/// Caller-driven constraint solver over atoms and candidate packages
pub struct ResolutionEngine {
    frames: Vec<Frame>,
    stacks: VecDeque<SearchStack>,
    atoms: HashMap<Atom, AtomState>,
    dependents: HashMap<Atom, HashMap<Dependent, usize>>,
    failed: HashMap<Atom, Vec<String>>,
    roots: Vec<Atom>,
    slots: SlotRegistry,
    /// Slotted packages by identity string, with share counts
    held: HashMap<String, (Arc<Package>, usize)>,
    pending: Option<Atom>,
    cycles: Vec<CycleBreak>,
    seen_cycles: HashSet<(Atom, Atom)>,
    conflicts: Vec<Conflict>,
    observer: SharedObserver,
    steps: usize,
}

impl ResolutionEngine {
    pub fn new(observer: SharedObserver) -> Self {
        Self {
            frames: Vec::new(),
            stacks: VecDeque::new(),
            atoms: HashMap::new(),
            dependents: HashMap::new(),
            failed: HashMap::new(),
            roots: Vec::new(),
            slots: SlotRegistry::new(),
            held: HashMap::new(),
            pending: None,
            cycles: Vec::new(),
            seen_cycles: HashSet::new(),
            conflicts: Vec::new(),
            observer,
            steps: 0,
        }
    }

    /// Request an atom
    ///
    /// An untracked atom gets a fresh search stack. An atom that is already
    /// tracked only gains the root marker, which keeps it from ever being
    /// dropped as unneeded.
    pub fn add_root_atom(&mut self, atom: Atom) -> Result<()> {
        if atom.is_blocker() {
            return Err(Error::Resolution(format!(
                "blocker {} cannot be requested directly",
                atom
            )));
        }
        if let Some(reasons) = self.failed.get(&atom) {
            return Err(Error::UnsatisfiableAtom {
                atom: atom.to_string(),
                reasons: reasons.clone(),
            });
        }

        *self
            .dependents
            .entry(atom.clone())
            .or_default()
            .entry(Dependent::Root)
            .or_insert(0) += 1;
        if !self.roots.contains(&atom) {
            self.roots.push(atom.clone());
        }

        if !self.atoms.contains_key(&atom) {
            debug!("adding root atom {}", atom);
            let id = self.push_frame(atom, None);
            self.stacks.push_back(SearchStack { frames: vec![id] });
        }
        Ok(())
    }

    /// Advance the search to the next atom that needs candidates
    ///
    /// Returns `Ok(None)` once no search stack remains. The returned atom
    /// must be answered with `satisfy_atom` before calling this again; if it
    /// is not, the atom is treated as having no candidates.
    pub fn next_unresolved_atom(&mut self) -> Result<Option<Atom>> {
        if let Some(atom) = self.pending.take()
            && !self.atoms.contains_key(&atom)
            && !self.failed.contains_key(&atom)
        {
            self.unsatisfiable_atom(&atom, "no candidates were supplied")?;
        }

        loop {
            let Some(stack) = self.stacks.front_mut() else {
                return Ok(None);
            };
            let Some(&top) = stack.frames.last() else {
                self.stacks.pop_front();
                continue;
            };
            let atom = self.frames[top].atom.clone();

            if self.failed.contains_key(&atom) || !self.is_needed(&atom) {
                trace!("dropping stale frame for {}", atom);
                self.pop_frame();
                continue;
            }

            let Some(state) = self.atoms.get(&atom) else {
                self.steps += 1;
                trace!("yielding {}", atom);
                self.pending = Some(atom.clone());
                return Ok(Some(atom));
            };

            let mut next_dep = None;
            let mut back_edges = Vec::new();
            for dep in state.choices.current_atoms() {
                if dep.is_blocker() {
                    continue;
                }
                match self.atoms.get(dep) {
                    Some(dep_state) => {
                        if !dep_state.complete && self.on_path(top, dep) {
                            back_edges.push(dep.clone());
                        }
                    }
                    None if !self.failed.contains_key(dep) => {
                        next_dep = Some(dep.clone());
                        break;
                    }
                    None => {}
                }
            }

            for dep in back_edges {
                self.record_cycle(top, dep);
            }

            match next_dep {
                Some(dep) => {
                    trace!("expanding {} -> {}", atom, dep);
                    let id = self.push_frame(dep, Some(top));
                    if let Some(stack) = self.stacks.front_mut() {
                        stack.frames.push(id);
                    }
                }
                None => {
                    if let Some(state) = self.atoms.get_mut(&atom) {
                        state.complete = true;
                    }
                    self.pop_frame();
                }
            }
        }
    }

    /// Supply the ordered candidates for the atom last yielded
    ///
    /// An empty candidate list marks the atom unsatisfiable immediately.
    pub fn satisfy_atom(&mut self, atom: &Atom, candidates: Vec<Arc<Package>>) -> Result<()> {
        if self.pending.as_ref() != Some(atom) {
            return Err(Error::Resolution(format!(
                "{} is not awaiting candidates",
                atom
            )));
        }
        self.pending = None;

        if candidates.is_empty() {
            return self.unsatisfiable_atom(atom, "no matching candidates");
        }

        debug!("{} has {} candidate(s)", atom, candidates.len());
        self.atoms.insert(
            atom.clone(),
            AtomState {
                choices: ChoicePoint::new(atom.clone(), candidates),
                held: None,
                limiters: Vec::new(),
                links: Vec::new(),
                complete: false,
                rejections: Vec::new(),
            },
        );

        if !self.adopt_choice(atom)? {
            return self.unsatisfiable_atom(atom, "every candidate was rejected");
        }
        Ok(())
    }

    /// Declare an atom impossible and let its dependents pick alternatives
    ///
    /// Dependents whose choice point still has a branch avoiding the atom
    /// switch to it and are requeued for expansion. A dependent that runs
    /// out of branches becomes unsatisfiable in turn. The call fails only
    /// when the failure reaches an atom requested as a root.
    pub fn unsatisfiable_atom(&mut self, atom: &Atom, reason: &str) -> Result<()> {
        if self.pending.as_ref() == Some(atom) {
            self.pending = None;
        }

        let mut work: VecDeque<(Atom, Vec<String>)> = VecDeque::new();
        work.push_back((atom.clone(), vec![reason.to_string()]));

        while let Some((bad, mut reasons)) = work.pop_front() {
            if self.failed.contains_key(&bad) {
                continue;
            }

            if let Some(state) = self.atoms.get(&bad) {
                reasons.splice(0..0, state.rejections.iter().cloned());
                let orphans = self.release_choice(&bad)?;
                self.atoms.remove(&bad);
                self.drop_orphans(orphans)?;
            }

            self.observer
                .debug(&format!("{} is unsatisfiable: {}", bad, reasons.join("; ")));
            self.conflicts.push(Conflict::Unsatisfiable {
                atom: bad.to_string(),
                reasons: reasons.clone(),
            });
            self.failed.insert(bad.clone(), reasons.clone());

            let dependents = self.dependents.remove(&bad).unwrap_or_default();
            if dependents.contains_key(&Dependent::Root) {
                return Err(Error::UnsatisfiableAtom {
                    atom: bad.to_string(),
                    reasons,
                });
            }

            for dependent in dependents.into_keys() {
                let Dependent::Atom(parent) = dependent else {
                    continue;
                };
                let Some(state) = self.atoms.get_mut(&parent) else {
                    continue;
                };
                if !state.choices.reduce_atoms(&bad) {
                    continue;
                }

                let orphans = self.release_choice(&parent)?;
                self.drop_orphans(orphans)?;
                if self.adopt_choice(&parent)? {
                    debug!("{} switched to an alternative avoiding {}", parent, bad);
                    self.requeue(&parent);
                } else {
                    let mut chain = reasons.clone();
                    chain.push(format!("every candidate for {} needs {}", parent, bad));
                    work.push_back((parent, chain));
                }
            }
        }
        Ok(())
    }

    /// Current state of an atom; `None` if never seen
    pub fn status(&self, atom: &Atom) -> Option<AtomStatus> {
        if self.failed.contains_key(atom) {
            return Some(AtomStatus::Unsatisfiable);
        }
        self.atoms.get(atom).map(|state| {
            if state.complete {
                AtomStatus::Complete
            } else {
                AtomStatus::Pending
            }
        })
    }

    /// The package currently chosen for an atom
    pub fn chosen(&self, atom: &Atom) -> Option<&Arc<Package>> {
        self.atoms.get(atom).and_then(|state| state.held.as_ref())
    }

    /// Atoms the current choice for `atom` depends on (blockers excluded)
    pub fn dependencies_of(&self, atom: &Atom) -> &[Atom] {
        self.atoms
            .get(atom)
            .map(|state| state.links.as_slice())
            .unwrap_or(&[])
    }

    /// Every tracked atom with its chosen package
    pub fn resolved(&self) -> impl Iterator<Item = (&Atom, &Arc<Package>)> {
        self.atoms
            .iter()
            .filter_map(|(atom, state)| state.held.as_ref().map(|pkg| (atom, pkg)))
    }

    /// Reasons recorded for an unsatisfiable atom
    pub fn failure(&self, atom: &Atom) -> Option<&[String]> {
        self.failed.get(atom).map(Vec::as_slice)
    }

    pub fn roots(&self) -> &[Atom] {
        &self.roots
    }

    pub fn cycles(&self) -> &[CycleBreak] {
        &self.cycles
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn slots(&self) -> &SlotRegistry {
        &self.slots
    }

    /// Number of atoms yielded so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// No stacks remain and nothing awaits candidates
    pub fn is_done(&self) -> bool {
        self.pending.is_none() && self.stacks.iter().all(|s| s.frames.is_empty())
    }

    fn push_frame(&mut self, atom: Atom, parent: Option<FrameId>) -> FrameId {
        self.frames.push(Frame { atom, parent });
        self.frames.len() - 1
    }

    fn pop_frame(&mut self) {
        if let Some(stack) = self.stacks.front_mut() {
            stack.frames.pop();
        }
    }

    fn is_needed(&self, atom: &Atom) -> bool {
        self.dependents.get(atom).is_some_and(|refs| !refs.is_empty())
    }

    /// Frame ids from the outermost ancestor down to `frame`
    fn path_to(&self, frame: FrameId) -> Vec<FrameId> {
        let mut path = vec![frame];
        let mut cursor = self.frames[frame].parent;
        while let Some(id) = cursor {
            path.push(id);
            cursor = self.frames[id].parent;
        }
        path.reverse();
        path
    }

    fn on_path(&self, frame: FrameId, atom: &Atom) -> bool {
        let mut cursor = Some(frame);
        while let Some(id) = cursor {
            if self.frames[id].atom == *atom {
                return true;
            }
            cursor = self.frames[id].parent;
        }
        false
    }

    fn record_cycle(&mut self, frame: FrameId, target: Atom) {
        let from = self.frames[frame].atom.clone();
        if !self.seen_cycles.insert((from, target.clone())) {
            return;
        }
        let path = self
            .path_to(frame)
            .into_iter()
            .map(|id| self.frames[id].atom.clone())
            .collect();
        let cycle = CycleBreak { atom: target, path };
        self.observer
            .info(&format!("breaking dependency cycle: {}", cycle));
        self.cycles.push(cycle);
    }

    /// Put an atom whose choice changed back in front of the search
    fn requeue(&mut self, atom: &Atom) {
        let id = self.push_frame(atom.clone(), None);
        self.stacks.push_front(SearchStack { frames: vec![id] });
    }

    /// Walk the choice point forward until its current candidate fits
    ///
    /// Returns false when the choice point is exhausted.
    fn adopt_choice(&mut self, atom: &Atom) -> Result<bool> {
        loop {
            let (pkg, branch) = match self.atoms.get(atom) {
                Some(state) => match state.choices.current_pkg() {
                    Some(pkg) => (Arc::clone(pkg), state.choices.current_atoms().to_vec()),
                    None => return Ok(false),
                },
                None => return Ok(false),
            };

            if let Some(bad) = branch.iter().find(|a| self.failed.contains_key(*a)).cloned() {
                if let Some(state) = self.atoms.get_mut(atom) {
                    state
                        .rejections
                        .push(format!("{} needs unsatisfiable {}", pkg, bad));
                    state.choices.reduce_atoms(&bad);
                }
                continue;
            }

            let pkg_id = pkg.to_string();
            match self.slots.fill_slotting(Arc::clone(&pkg)) {
                None => {
                    self.held.insert(pkg_id.clone(), (Arc::clone(&pkg), 1));
                }
                Some(Occupant::Package(other)) if other.to_string() == pkg_id => {
                    if let Some((_, count)) = self.held.get_mut(&pkg_id) {
                        *count += 1;
                    }
                }
                Some(occupant) => {
                    let conflict = match occupant {
                        Occupant::Package(other) => Conflict::SlotCollision {
                            atom: atom.to_string(),
                            candidate: pkg_id.clone(),
                            occupant: other.to_string(),
                        },
                        Occupant::Limiter(blocker) => Conflict::Blocked {
                            atom: atom.to_string(),
                            candidate: pkg_id.clone(),
                            blocker: blocker.to_string(),
                        },
                    };
                    self.reject_candidate(atom, conflict);
                    continue;
                }
            }

            let blockers: Vec<&Atom> = branch.iter().filter(|a| a.is_blocker()).collect();
            let hit = blockers.iter().find_map(|blocker| {
                self.slots
                    .occupants(&blocker.key())
                    .iter()
                    .find_map(|occupant| match occupant {
                        Occupant::Package(chosen)
                            if chosen.to_string() != pkg_id && blocker.matches(chosen) =>
                        {
                            Some(((*blocker).clone(), chosen.to_string()))
                        }
                        _ => None,
                    })
            });
            if let Some((blocker, chosen)) = hit {
                self.release_package(&pkg_id)?;
                let conflict = Conflict::BlocksChosen {
                    atom: atom.to_string(),
                    blocker: blocker.to_string(),
                    chosen,
                };
                self.observer.debug(&conflict.to_string());
                if let Some(state) = self.atoms.get_mut(atom) {
                    state.rejections.push(conflict.to_string());
                    state.choices.reduce_atoms(&blocker);
                }
                self.conflicts.push(conflict);
                continue;
            }

            let mut limiters = Vec::with_capacity(blockers.len());
            for blocker in blockers {
                let limiter = Arc::new(blocker.clone());
                self.slots.add_limiter(Arc::clone(&limiter))?;
                limiters.push(limiter);
            }

            let links: Vec<Atom> = branch.into_iter().filter(|a| !a.is_blocker()).collect();
            for dep in &links {
                *self
                    .dependents
                    .entry(dep.clone())
                    .or_default()
                    .entry(Dependent::Atom(atom.clone()))
                    .or_insert(0) += 1;
            }

            debug!("{} -> {}", atom, pkg_id);
            if let Some(state) = self.atoms.get_mut(atom) {
                state.held = Some(pkg);
                state.limiters = limiters;
                state.links = links;
                state.complete = false;
            }
            return Ok(true);
        }
    }

    fn reject_candidate(&mut self, atom: &Atom, conflict: Conflict) {
        let message = conflict.to_string();
        self.observer.debug(&message);
        if let Some(state) = self.atoms.get_mut(atom) {
            state.rejections.push(message);
            state.choices.advance_candidate();
        }
        self.conflicts.push(conflict);
    }

    fn release_package(&mut self, pkg_id: &str) -> Result<()> {
        let last = match self.held.get_mut(pkg_id) {
            Some((_, count)) => {
                *count -= 1;
                *count == 0
            }
            None => false,
        };
        if last && let Some((pkg, _)) = self.held.remove(pkg_id) {
            self.slots.remove_slotting(&Occupant::Package(pkg))?;
        }
        Ok(())
    }

    /// Undo the slotting, limiters and dependency links of the current
    /// choice; returns atoms that no longer have any dependent
    fn release_choice(&mut self, atom: &Atom) -> Result<Vec<Atom>> {
        let Some(state) = self.atoms.get_mut(atom) else {
            return Ok(Vec::new());
        };
        let held = state.held.take();
        let limiters = mem::take(&mut state.limiters);
        let links = mem::take(&mut state.links);
        state.complete = false;

        if let Some(pkg) = held {
            self.release_package(&pkg.to_string())?;
        }
        for limiter in limiters {
            self.slots.remove_slotting(&Occupant::Limiter(limiter))?;
        }

        let me = Dependent::Atom(atom.clone());
        let mut orphans = Vec::new();
        for dep in links {
            let Some(refs) = self.dependents.get_mut(&dep) else {
                continue;
            };
            if let Some(count) = refs.get_mut(&me) {
                *count -= 1;
                if *count == 0 {
                    refs.remove(&me);
                }
            }
            if refs.is_empty() {
                self.dependents.remove(&dep);
                if self.atoms.contains_key(&dep) {
                    orphans.push(dep);
                }
            }
        }
        Ok(orphans)
    }

    /// Forget atoms nothing depends on any more, transitively
    fn drop_orphans(&mut self, mut orphans: Vec<Atom>) -> Result<()> {
        while let Some(orphan) = orphans.pop() {
            if self.is_needed(&orphan) || !self.atoms.contains_key(&orphan) {
                continue;
            }
            debug!("dropping {}: no longer required", orphan);
            let more = self.release_choice(&orphan)?;
            self.atoms.remove(&orphan);
            orphans.extend(more);
        }
        Ok(())
    }
}
