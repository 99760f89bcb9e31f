//! The per-connection session state machine.
//!
//! A [`SessionClient`] holds everything the client learns during one
//! socket's lifetime and decides how to react to each server command.
//! It never touches the socket, the clock or the filesystem itself:
//! every reaction comes back as a list of [`Effect`]s that the
//! supervisor carries out. That keeps the whole protocol flow testable
//! as plain function calls.
//!
//! # The post-connect sequence
//!
//! ```text
//! Connected ─┬─(settings delay)──→ RequestSettings: Get + SetNotify settings key
//!            │
//!            └─(refresh delay)───→ RefreshHints ──(hints disabled)──→ Disconnect
//!                                      │
//!                                      ├─(local slot unknown)──────────┐
//!                                      ▼                               │
//!                              Get _read_hints_<team>_<slot>           │
//!                                      │ (hinted grace)                │
//!                                      ▼                               │
//!                              ReconcileHinted ──(no candidates)──┐    │
//!                                      │              NoMoreHints │    │
//!                                      ▼                          │    │
//!                              LocationScouts(candidates)         │    │
//!                                      │ (scout grace)            │    │
//!                                      ▼                          ▼    ▼
//!                              RequestDataPackages: GetDataPackage(roster games)
//! ```
//!
//! Each arrow with a delay is an [`Effect::Schedule`]; the supervisor
//! sleeps and then calls [`SessionClient::follow_up`] with the step, but
//! only if this session is still the active one.

use std::time::Duration;

use hintforge_protocol::{
    ClientCommand, ConnectedPacket, HintSettings, LocationInfoPacket, LooseId, PrintJsonPacket,
    RetrievedPacket, ServerCommand, SlotAuth, hints_key,
};
use hintforge_store::DataCache;
use rand::Rng;
use serde::Serialize;

use crate::{
    DifficultyWeights, LocationSets, ProgressionLog, ProgressionRecord, Roster, SessionConfig,
    SessionError, SlotEntry, format_hint, select_reward,
};

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// A deferred step of the post-connect sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    RequestSettings,
    RefreshHints,
    ReconcileHinted,
    RequestDataPackages,
}

/// A user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A hint was revealed. `for_local_slot` is set when the hinted item
    /// sits in the connected player's world, which also warrants a local
    /// push notification.
    NewHint {
        message: String,
        for_local_slot: bool,
    },
    /// Every missing location is already hinted.
    NoMoreHints,
    /// The server administrator turned hints off.
    HintsDisabled,
}

/// Something the supervisor must do on the session's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send these commands as one frame.
    Send(Vec<ClientCommand>),
    /// The server accepted the slot; the connection is now usable.
    Opened,
    /// Call [`SessionClient::follow_up`] with `step` after `delay`.
    Schedule { delay: Duration, step: FollowUp },
    Notify(Notice),
    /// Tear the connection down and stop reconnecting.
    Disconnect,
}

/// Process-wide state a session reads and updates.
pub struct SessionDeps<'a> {
    pub datapacks: &'a mut DataCache,
    pub weights: &'a mut DifficultyWeights,
}

/// A read-only copy of a session's state, for display and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub slot_name: String,
    pub open: bool,
    pub hints_enabled: bool,
    pub roster: Vec<SlotEntry>,
    pub checked: Vec<String>,
    pub missing: Vec<String>,
    pub hinted: Vec<String>,
    pub candidates: Vec<String>,
    pub progression: Vec<ProgressionRecord>,
}

// ---------------------------------------------------------------------------
// SessionClient
// ---------------------------------------------------------------------------

pub struct SessionClient {
    config: SessionConfig,
    slot_name: String,
    password: String,
    open: bool,
    hints_enabled: bool,
    roster: Roster,
    locations: LocationSets,
    progression: ProgressionLog,
}

impl SessionClient {
    pub fn new(config: SessionConfig, slot_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            config,
            slot_name: slot_name.into(),
            password: password.into(),
            open: false,
            hints_enabled: true,
            roster: Roster::default(),
            locations: LocationSets::default(),
            progression: ProgressionLog::default(),
        }
    }

    fn auth(&self) -> SlotAuth {
        SlotAuth::new(&self.slot_name, &self.password)
            .with_version(self.config.version.clone())
            .with_tags(self.config.tags.clone())
    }

    /// The `Connect` command to send as soon as the socket is up.
    pub fn open(&self) -> Vec<Effect> {
        tracing::debug!(slot = %self.slot_name, "sending Connect");
        vec![Effect::Send(vec![ClientCommand::Connect {
            auth: self.auth().with_slot_data(false),
        }])]
    }

    /// Records that the socket is gone. Later follow-ups become no-ops.
    pub fn mark_closed(&mut self) {
        self.open = false;
    }

    // -- Incoming commands --------------------------------------------------

    /// Applies one server command and returns what must happen next.
    pub fn handle(&mut self, command: ServerCommand, deps: &mut SessionDeps<'_>) -> Vec<Effect> {
        tracing::trace!(cmd = command.name(), "handling server command");
        match command {
            ServerCommand::Connected(packet) => self.on_connected(packet),
            ServerCommand::Retrieved(packet) => self.on_retrieved(packet, deps),
            ServerCommand::LocationInfo(packet) => {
                self.on_location_info(packet);
                Vec::new()
            }
            ServerCommand::DataPackage(packet) => {
                let games = deps.datapacks.ingest_combined(&packet.data);
                tracing::info!(games, "received datapacks");
                Vec::new()
            }
            ServerCommand::PrintJson(packet) => self.on_print_json(&packet, deps.datapacks),
            ServerCommand::SetReply(packet) => match packet.settings(&self.config.settings_key) {
                Some(settings) => self.apply_settings(settings, deps.weights, false),
                None => Vec::new(),
            },
            ServerCommand::Unhandled { cmd } => {
                tracing::debug!(cmd, "ignoring unhandled command");
                Vec::new()
            }
        }
    }

    fn on_connected(&mut self, packet: ConnectedPacket) -> Vec<Effect> {
        if let (Some(checked), Some(missing)) = (packet.checked_locations, packet.missing_locations) {
            self.locations.replace(checked, missing);
        }
        if let Some(slot_info) = &packet.slot_info {
            self.roster = Roster::from_slot_info(slot_info);
        }
        if let Some(players) = &packet.players {
            self.roster.merge_teams(players);
        }
        self.open = true;
        tracing::info!(
            slot = %self.slot_name,
            slots = self.roster.len(),
            checked = self.locations.checked.len(),
            missing = self.locations.missing.len(),
            "slot connected"
        );

        vec![
            Effect::Opened,
            Effect::Schedule {
                delay: self.config.settings_delay(),
                step: FollowUp::RequestSettings,
            },
            Effect::Schedule {
                delay: self.config.refresh_delay(),
                step: FollowUp::RefreshHints,
            },
        ]
    }

    fn on_retrieved(&mut self, packet: RetrievedPacket, deps: &mut SessionDeps<'_>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(settings) = packet.settings(&self.config.settings_key) {
            effects = self.apply_settings(settings, deps.weights, true);
        }
        let hinted = packet.hinted_locations();
        if !hinted.is_empty() {
            tracing::debug!(count = hinted.len(), "received hinted locations");
            self.locations.add_hinted(hinted);
        }
        effects
    }

    /// Applies administrative settings.
    ///
    /// A `Retrieved` reply re-checks the current enabled flag even when
    /// the object omits it; a `SetReply` only reacts to an explicit flag.
    fn apply_settings(
        &mut self,
        settings: HintSettings,
        weights: &mut DifficultyWeights,
        recheck_current: bool,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(enabled) = settings.enabled {
            tracing::info!(enabled, "hint settings updated");
            self.hints_enabled = enabled;
        }
        if (settings.enabled.is_some() || recheck_current) && !self.hints_enabled {
            tracing::warn!("hints are disabled on the server");
            effects.push(Effect::Notify(Notice::HintsDisabled));
            effects.push(Effect::Disconnect);
        }
        if let Some(mapping) = settings.weights {
            weights.apply_percentages(&mapping);
        }
        effects
    }

    fn on_location_info(&mut self, packet: LocationInfoPacket) {
        let before = self.progression.len();
        for item in packet.locations {
            if let (Some(location), Some(flags)) = (item.location, item.flags) {
                self.progression.push(ProgressionRecord { location, flags });
            }
        }
        tracing::debug!(
            added = self.progression.len() - before,
            total = self.progression.len(),
            "updated progression records"
        );
    }

    fn on_print_json(&self, packet: &PrintJsonPacket, datapacks: &DataCache) -> Vec<Effect> {
        let Some(hint) = packet.hint() else {
            return Vec::new();
        };
        let message = format_hint(&hint, &self.roster, datapacks);
        let local = self.local_slot().map(|slot| slot.number.as_str());
        let for_local_slot = local.is_some() && local == message.sender.as_deref();
        tracing::info!(hint = %message.text, for_local_slot, "hint received");
        vec![Effect::Notify(Notice::NewHint {
            message: message.text,
            for_local_slot,
        })]
    }

    // -- Deferred steps -----------------------------------------------------

    /// Runs a step scheduled by an earlier [`Effect::Schedule`].
    ///
    /// Does nothing once the session is closed.
    pub fn follow_up(&mut self, step: FollowUp) -> Vec<Effect> {
        if !self.open {
            tracing::debug!(?step, "session closed; dropping follow-up");
            return Vec::new();
        }
        match step {
            FollowUp::RequestSettings => {
                let keys = vec![self.config.settings_key.clone()];
                vec![Effect::Send(vec![
                    ClientCommand::Get {
                        keys: keys.clone(),
                        auth: self.auth(),
                    },
                    ClientCommand::SetNotify {
                        keys,
                        auth: self.auth(),
                    },
                ])]
            }
            FollowUp::RefreshHints => self.refresh_hints(),
            FollowUp::ReconcileHinted => self.reconcile_hinted(),
            FollowUp::RequestDataPackages => self.request_datapacks(),
        }
    }

    fn refresh_hints(&mut self) -> Vec<Effect> {
        if !self.hints_enabled {
            tracing::info!("hints disabled; closing session");
            return vec![Effect::Disconnect];
        }
        let Some((team, slot)) = self.team_and_slot() else {
            tracing::warn!(slot = %self.slot_name, "slot not found in roster; skipping hint refresh");
            return self.request_datapacks();
        };
        vec![
            Effect::Send(vec![ClientCommand::Get {
                keys: vec![hints_key(&team, &slot)],
                auth: self.auth(),
            }]),
            Effect::Schedule {
                delay: self.config.hinted_grace(),
                step: FollowUp::ReconcileHinted,
            },
        ]
    }

    fn reconcile_hinted(&mut self) -> Vec<Effect> {
        if self.locations.recompute_candidates().is_empty() {
            tracing::info!("no unhinted locations left");
            let mut effects = vec![Effect::Notify(Notice::NoMoreHints)];
            effects.extend(self.request_datapacks());
            return effects;
        }
        let locations = self.locations.numeric_candidates();
        tracing::debug!(count = locations.len(), "scouting candidate locations");
        vec![
            Effect::Send(vec![ClientCommand::LocationScouts {
                locations,
                create_as_hint: 0,
                auth: self.auth(),
            }]),
            Effect::Schedule {
                delay: self.config.scout_grace(),
                step: FollowUp::RequestDataPackages,
            },
        ]
    }

    fn request_datapacks(&self) -> Vec<Effect> {
        let games = self.roster.games();
        if games.is_empty() {
            tracing::debug!("roster has no games; no datapacks to request");
            return Vec::new();
        }
        tracing::debug!(?games, "requesting datapacks");
        vec![Effect::Send(vec![ClientCommand::GetDataPackage {
            games,
            auth: self.auth(),
        }])]
    }

    // -- Rewards ------------------------------------------------------------

    /// Picks the location to hint for a solved puzzle.
    ///
    /// # Errors
    /// `NoProgressionRecords` before any scouting reply arrived,
    /// `HintsDisabled` when the server turned hints off, and otherwise
    /// whatever [`select_reward`] reports.
    pub fn choose_reward<R: Rng>(
        &self,
        difficulty: &str,
        weights: &DifficultyWeights,
        rng: &mut R,
    ) -> Result<LooseId, SessionError> {
        if self.progression.is_empty() {
            return Err(SessionError::NoProgressionRecords);
        }
        if !self.hints_enabled {
            return Err(SessionError::HintsDisabled);
        }
        let record = select_reward(weights, difficulty, self.progression.records(), rng)?;
        Ok(record.location.clone())
    }

    /// Builds the hint-creating scout for `location`.
    ///
    /// # Errors
    /// `InvalidLocation` if the id is not an integer.
    pub fn hint_request(&self, location: &LooseId) -> Result<ClientCommand, SessionError> {
        let id = location
            .as_i64()
            .ok_or_else(|| SessionError::InvalidLocation(location.to_string()))?;
        Ok(ClientCommand::LocationScouts {
            locations: vec![id],
            create_as_hint: 1,
            auth: self.auth(),
        })
    }

    // -- Accessors ----------------------------------------------------------

    /// The roster entry whose name is this session's slot name.
    pub fn local_slot(&self) -> Option<&SlotEntry> {
        self.roster.find_by_name(&self.slot_name)
    }

    fn team_and_slot(&self) -> Option<(LooseId, LooseId)> {
        let entry = self.local_slot()?;
        let team = entry.team.clone()?;
        Some((team, LooseId::new(entry.number.clone())))
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn hints_enabled(&self) -> bool {
        self.hints_enabled
    }

    pub fn slot_name(&self) -> &str {
        &self.slot_name
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn locations(&self) -> &LocationSets {
        &self.locations
    }

    pub fn progression(&self) -> &[ProgressionRecord] {
        self.progression.records()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let strings = |set: &std::collections::BTreeSet<LooseId>| -> Vec<String> {
            set.iter().map(ToString::to_string).collect()
        };
        SessionSnapshot {
            slot_name: self.slot_name.clone(),
            open: self.open,
            hints_enabled: self.hints_enabled,
            roster: self.roster.iter().cloned().collect(),
            checked: strings(&self.locations.checked),
            missing: strings(&self.locations.missing),
            hinted: strings(&self.locations.hinted),
            candidates: strings(&self.locations.candidate),
            progression: self.progression.records().to_vec(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
