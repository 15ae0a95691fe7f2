//! Applying a new ecosystem to a running engine.
//!
//! The controller is `Idle` until a description is requested, `Resetting`
//! while it waits to apply it, and returns to `Idle` once the new particles
//! are live. It never blocks: the host calls [`ResetController::advance`]
//! once per tick and timed transitions count down inside it.

use crossbeam_channel::{unbounded, Receiver, Sender};
use ecosim_config::{ResetBehavior, ResetSettings};
use ecosim_core::EcosystemDescription;
use log::{debug, info, warn};
use thiserror::Error;

use crate::engine::ParticleSimulationEngine;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResetError {
    #[error("Reset behavior {0:?} is not supported")]
    Unsupported(ResetBehavior),
}

/// Lifecycle notifications, in emission order for one request:
/// `Started`, then `Midway` when old particles are gone and new ones are not
/// yet visible, then `Finished`. A request replaced before it finished ends
/// with `Superseded` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ResetEvent {
    Started { name: String, behavior: ResetBehavior },
    Midway { name: String, behavior: ResetBehavior },
    Finished { name: String, behavior: ResetBehavior, particle_count: usize },
    Superseded { name: String, behavior: ResetBehavior },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Idle,
    Resetting(ResetBehavior),
}

struct PendingReset {
    description: EcosystemDescription,
    behavior: ResetBehavior,
    elapsed: f32,
    swapped: bool,
}

pub struct ResetController {
    settings: ResetSettings,
    pending: Option<PendingReset>,
    subscribers: Vec<Sender<ResetEvent>>,
}

impl ResetController {
    pub fn new(settings: &ResetSettings) -> Self {
        Self {
            settings: settings.clone(),
            pending: None,
            subscribers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ResetSettings {
        &self.settings
    }

    pub fn set_reset_time(&mut self, reset_time: f32) {
        self.settings.reset_time = reset_time.max(0.0);
    }

    pub fn state(&self) -> ResetState {
        match &self.pending {
            Some(pending) => ResetState::Resetting(pending.behavior),
            None => ResetState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// New receiver for every event emitted from now on. Dropping the
    /// receiver unsubscribes it.
    pub fn subscribe(&mut self) -> Receiver<ResetEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Schedules `description` to replace the live ecosystem. Any reset still
    /// pending is cancelled. Nothing touches the engine until the next
    /// [`advance`](Self::advance).
    pub fn request(
        &mut self,
        description: EcosystemDescription,
        behavior: ResetBehavior,
    ) -> Result<(), ResetError> {
        let timed = matches!(behavior, ResetBehavior::FadeInOut | ResetBehavior::SmoothTransition);
        if timed && !self.settings.allow_transition_fallback {
            warn!("Rejecting {:?} reset to '{}'", behavior, description.name);
            return Err(ResetError::Unsupported(behavior));
        }

        if let Some(previous) = self.pending.take() {
            info!(
                "Reset to '{}' superseded by '{}'",
                previous.description.name, description.name
            );
            self.emit(ResetEvent::Superseded {
                name: previous.description.name,
                behavior: previous.behavior,
            });
        }

        debug!("Reset to '{}' requested with {:?}", description.name, behavior);
        self.emit(ResetEvent::Started {
            name: description.name.clone(),
            behavior,
        });
        self.pending = Some(PendingReset {
            description,
            behavior,
            elapsed: 0.0,
            swapped: false,
        });
        Ok(())
    }

    /// Drives the pending reset, if any, by `dt` seconds of simulation time.
    pub fn advance(&mut self, dt: f32, engine: &mut ParticleSimulationEngine) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };

        match pending.behavior {
            ResetBehavior::None => {
                engine.update_colors(&pending.description);
                self.finish(pending, engine);
            }
            ResetBehavior::ResetPositions => {
                self.swap(&mut pending, engine);
                self.finish(pending, engine);
            }
            ResetBehavior::FadeInOut | ResetBehavior::SmoothTransition => {
                // No blending yet: the swap happens halfway through and the
                // rest of the time is simply waited out.
                pending.elapsed += dt;
                let half = self.settings.reset_time * 0.5;
                if !pending.swapped && pending.elapsed >= half {
                    self.swap(&mut pending, engine);
                }
                if pending.swapped && pending.elapsed >= self.settings.reset_time {
                    self.finish(pending, engine);
                } else {
                    self.pending = Some(pending);
                }
            }
        }
    }

    fn swap(&mut self, pending: &mut PendingReset, engine: &mut ParticleSimulationEngine) {
        engine.clear();
        self.emit(ResetEvent::Midway {
            name: pending.description.name.clone(),
            behavior: pending.behavior,
        });
        engine.repopulate(pending.description.clone());
        pending.swapped = true;
    }

    fn finish(&mut self, pending: PendingReset, engine: &ParticleSimulationEngine) {
        info!(
            "Reset to '{}' finished with {} particles",
            pending.description.name,
            engine.particle_count()
        );
        self.emit(ResetEvent::Finished {
            name: pending.description.name,
            behavior: pending.behavior,
            particle_count: engine.particle_count(),
        });
    }

    fn emit(&mut self, event: ResetEvent) {
        self.subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{quiet_settings, single_species};
    use ecosim_core::{Rgba, SocialDescription};
    use glam::Vec3;

    fn description(name: &str, particles: usize) -> EcosystemDescription {
        let positions: Vec<Vec3> = (0..particles)
            .map(|i| Vec3::new(i as f32 * 0.1, 0.0, 0.0))
            .collect();
        let mut description = single_species(
            2,
            SocialDescription { social_force: 0.001, social_range: 0.5 },
            0.001,
            &positions,
        );
        description.name = name.to_string();
        description
    }

    fn fallback_settings() -> ResetSettings {
        ResetSettings {
            behavior: ResetBehavior::FadeInOut,
            reset_time: 1.0,
            allow_transition_fallback: true,
        }
    }

    fn drain(receiver: &Receiver<ResetEvent>) -> Vec<ResetEvent> {
        receiver.try_iter().collect()
    }

    #[test]
    fn reset_positions_applies_on_next_advance() {
        let mut engine = ParticleSimulationEngine::new(quiet_settings());
        engine.repopulate(description("old", 3));
        for _ in 0..4 {
            engine.step();
        }

        let mut controller = ResetController::new(&ResetSettings::default());
        let events = controller.subscribe();
        controller.request(description("new", 5), ResetBehavior::ResetPositions).unwrap();
        assert_eq!(controller.state(), ResetState::Resetting(ResetBehavior::ResetPositions));
        assert_eq!(engine.particle_count(), 3);

        controller.advance(1.0 / 60.0, &mut engine);
        assert_eq!(controller.state(), ResetState::Idle);
        assert_eq!(engine.particle_count(), 5);
        assert!(engine.particles().iter().all(|p| p.delayed_forces() == 0));
        assert_eq!(engine.description().name, "new");

        let behavior = ResetBehavior::ResetPositions;
        assert_eq!(
            drain(&events),
            vec![
                ResetEvent::Started { name: "new".into(), behavior },
                ResetEvent::Midway { name: "new".into(), behavior },
                ResetEvent::Finished { name: "new".into(), behavior, particle_count: 5 },
            ]
        );
    }

    #[test]
    fn none_only_recolors() {
        let mut engine = ParticleSimulationEngine::new(quiet_settings());
        engine.repopulate(description("live", 4));
        engine.step();
        let before = engine.snapshot();

        let mut recolor = description("palette", 9);
        recolor.species_data[0].color = Rgba::new(1.0, 0.0, 0.0, 1.0);

        let mut controller = ResetController::new(&ResetSettings::default());
        let events = controller.subscribe();
        controller.request(recolor, ResetBehavior::None).unwrap();
        controller.advance(1.0 / 60.0, &mut engine);

        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.species_colors(), vec![Rgba::new(1.0, 0.0, 0.0, 1.0)]);
        let events = drain(&events);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], ResetEvent::Finished { particle_count: 4, .. }));
    }

    #[test]
    fn timed_behaviors_are_unsupported_without_fallback() {
        let mut controller = ResetController::new(&ResetSettings::default());
        let events = controller.subscribe();
        assert_eq!(
            controller.request(description("fade", 2), ResetBehavior::FadeInOut),
            Err(ResetError::Unsupported(ResetBehavior::FadeInOut))
        );
        assert_eq!(
            controller.request(description("smooth", 2), ResetBehavior::SmoothTransition),
            Err(ResetError::Unsupported(ResetBehavior::SmoothTransition))
        );
        assert!(controller.is_idle());
        assert!(drain(&events).is_empty());
    }

    #[test]
    fn fallback_swaps_at_half_reset_time() {
        let mut engine = ParticleSimulationEngine::new(quiet_settings());
        engine.repopulate(description("old", 3));

        let mut controller = ResetController::new(&fallback_settings());
        let events = controller.subscribe();
        controller.request(description("new", 6), ResetBehavior::FadeInOut).unwrap();

        let dt = 0.125;
        for _ in 0..3 {
            controller.advance(dt, &mut engine);
            assert_eq!(engine.description().name, "old");
        }
        controller.advance(dt, &mut engine);
        assert_eq!(engine.description().name, "new");
        assert_eq!(engine.particle_count(), 6);
        assert_eq!(controller.state(), ResetState::Resetting(ResetBehavior::FadeInOut));

        for _ in 0..3 {
            controller.advance(dt, &mut engine);
        }
        assert!(!controller.is_idle());
        controller.advance(dt, &mut engine);
        assert!(controller.is_idle());

        let events = drain(&events);
        assert!(matches!(events[1], ResetEvent::Midway { .. }));
        assert!(matches!(events[2], ResetEvent::Finished { particle_count: 6, .. }));
    }

    #[test]
    fn new_request_supersedes_pending_one() {
        let mut engine = ParticleSimulationEngine::new(quiet_settings());
        let mut controller = ResetController::new(&fallback_settings());
        let events = controller.subscribe();

        controller.request(description("first", 2), ResetBehavior::SmoothTransition).unwrap();
        controller.advance(0.25, &mut engine);
        controller.request(description("second", 7), ResetBehavior::ResetPositions).unwrap();
        controller.advance(0.25, &mut engine);

        assert_eq!(engine.description().name, "second");
        assert_eq!(engine.particle_count(), 7);
        let events = drain(&events);
        assert_eq!(
            events[1],
            ResetEvent::Superseded {
                name: "first".into(),
                behavior: ResetBehavior::SmoothTransition,
            }
        );
        assert!(events
            .iter()
            .all(|event| !matches!(event, ResetEvent::Midway { name, .. } if name == "first")));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut engine = ParticleSimulationEngine::new(quiet_settings());
        let mut controller = ResetController::new(&ResetSettings::default());
        let kept = controller.subscribe();
        drop(controller.subscribe());

        controller.request(description("pond", 1), ResetBehavior::ResetPositions).unwrap();
        controller.advance(0.1, &mut engine);
        assert_eq!(controller.subscribers.len(), 1);
        assert_eq!(drain(&kept).len(), 3);
    }

    #[test]
    fn advance_without_request_is_a_no_op() {
        let mut engine = ParticleSimulationEngine::new(quiet_settings());
        engine.repopulate(description("steady", 2));
        let mut controller = ResetController::new(&ResetSettings::default());
        controller.advance(1.0, &mut engine);
        assert_eq!(engine.particle_count(), 2);
        assert!(controller.is_idle());
    }
}
