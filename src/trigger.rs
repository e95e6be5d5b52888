//! Frame-count throttling for the external correction programs.

use std::io;
use std::process::ExitStatus;
use std::sync::Mutex;

use gstreamer as gst;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::analysis::CAT;
use crate::colorspace::Bgr;

/// Frames processed before any trigger may arm.
pub const WARM_UP_FRAMES: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    #[default]
    Idle,
    Armed {
        count: u32,
    },
}

impl Trigger {
    /// Advance by one frame. Returns `true` when the program should run.
    ///
    /// The frame that arms the trigger is not counted; afterwards every
    /// `active` frame counts and the trigger fires once the count exceeds
    /// `skip_frames`, starting over from zero.
    pub fn tick(&mut self, frame: u64, active: bool, skip_frames: u32) -> bool {
        match *self {
            Trigger::Idle => {
                if frame > WARM_UP_FRAMES {
                    *self = Trigger::Armed { count: 0 };
                }
                false
            }
            Trigger::Armed { count } if active => {
                let count = count.saturating_add(1);
                if count > skip_frames {
                    *self = Trigger::Armed { count: 0 };
                    true
                } else {
                    *self = Trigger::Armed { count };
                    false
                }
            }
            Trigger::Armed { .. } => false,
        }
    }
}

/// Per-stream memory of the analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameState {
    frame: u64,
    pub color_checker: Trigger,
    pub white_balance: Trigger,
}

impl FrameState {
    /// Count a new frame and return its 1-based number.
    pub fn begin_frame(&mut self) -> u64 {
        self.frame += 1;
        self.frame
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// A program and its argument vector. No shell is involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

pub trait ProcessLauncher: Send + Sync {
    /// Start `program` without waiting for it. Failures stay with the
    /// launcher.
    fn invoke(&self, invocation: &Invocation);
}

/// Arguments for the color-checker program: truncated B G R of every
/// patch in patch order, then the extra arguments.
pub fn color_checker_args(means: &[Bgr], extra: Option<&str>) -> Vec<String> {
    means
        .iter()
        .flat_map(|m| m.truncated())
        .map(|v| v.to_string())
        .chain(split_extra(extra))
        .collect()
}

/// Arguments for the white-balance program: truncated `B G R`, then the
/// extra arguments.
pub fn white_balance_args(mean: Bgr, extra: Option<&str>) -> Vec<String> {
    mean.truncated()
        .iter()
        .map(|v| v.to_string())
        .chain(split_extra(extra))
        .collect()
}

fn split_extra(extra: Option<&str>) -> impl Iterator<Item = String> + '_ {
    extra
        .into_iter()
        .flat_map(str::split_whitespace)
        .map(str::to_owned)
}

static RUNTIME: Lazy<Option<tokio::runtime::Runtime>> = Lazy::new(|| {
    match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("markerdetect-launcher")
        .enable_all()
        .build()
    {
        Ok(rt) => Some(rt),
        Err(err) => {
            gst::error!(CAT, "failed to start launcher runtime: {}", err);
            None
        }
    }
});

/// Spawns programs on a shared tokio runtime and reaps them off the
/// streaming thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioLauncher;

impl TokioLauncher {
    /// Spawn `invocation` and return a handle resolving to its exit status.
    ///
    /// Returns `None` when the runtime could not be started. Dropping the
    /// handle detaches the task; the child is still reaped.
    pub fn launch(
        &self,
        invocation: &Invocation,
    ) -> Option<JoinHandle<io::Result<ExitStatus>>> {
        let Some(rt) = RUNTIME.as_ref() else {
            gst::warning!(CAT, "no launcher runtime, dropping {}", invocation.program);
            return None;
        };
        let invocation = invocation.clone();
        Some(rt.spawn(async move {
            let result = match tokio::process::Command::new(&invocation.program)
                .args(&invocation.args)
                .kill_on_drop(false)
                .spawn()
            {
                Ok(mut child) => child.wait().await,
                Err(err) => {
                    gst::warning!(CAT, "failed to spawn {}: {}", invocation.program, err);
                    return Err(err);
                }
            };
            match &result {
                Ok(status) if status.success() => {
                    gst::debug!(CAT, "{} exited with {}", invocation.program, status);
                }
                Ok(status) => {
                    gst::warning!(CAT, "{} exited with {}", invocation.program, status);
                }
                Err(err) => {
                    gst::warning!(CAT, "waiting for {} failed: {}", invocation.program, err);
                }
            }
            result
        }))
    }

    /// Block until `handle` resolves. Must not be called from the runtime.
    pub fn wait(&self, handle: JoinHandle<io::Result<ExitStatus>>) -> io::Result<ExitStatus> {
        let Some(rt) = RUNTIME.as_ref() else {
            return Err(io::Error::new(io::ErrorKind::Other, "no launcher runtime"));
        };
        rt.block_on(handle)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
    }
}

impl ProcessLauncher for TokioLauncher {
    fn invoke(&self, invocation: &Invocation) {
        let _detached = self.launch(invocation);
    }
}

/// Keeps invocations instead of running them.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingLauncher {
    pub fn take(&self) -> Vec<Invocation> {
        match self.invocations.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn invoke(&self, invocation: &Invocation) {
        match self.invocations.lock() {
            Ok(mut guard) => guard.push(invocation.clone()),
            Err(poisoned) => poisoned.into_inner().push(invocation.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fires(skip_frames: u32, frames: u64) -> Vec<u64> {
        let mut state = FrameState::default();
        let mut fired = Vec::new();
        for _ in 0..frames {
            let frame = state.begin_frame();
            if state.color_checker.tick(frame, true, skip_frames) {
                fired.push(frame);
            }
        }
        fired
    }

    #[test]
    fn first_fire_after_warm_up_and_skip() {
        for n in [0u32, 1, 5, 30] {
            let fired = fires(n, 200);
            assert_eq!(fired[0], WARM_UP_FRAMES + u64::from(n) + 2, "skip {}", n);
        }
    }

    #[test]
    fn repeats_every_skip_plus_one_frames() {
        let fired = fires(3, 80);
        assert_eq!(fired, vec![55, 59, 63, 67, 71, 75, 79]);
    }

    #[test]
    fn inactive_frames_do_not_count() {
        let mut trigger = Trigger::default();
        for frame in 1..=51 {
            assert!(!trigger.tick(frame, false, 0));
        }
        assert_eq!(trigger, Trigger::Armed { count: 0 });
        assert!(!trigger.tick(52, false, 0));
        assert!(trigger.tick(53, true, 0));
    }

    #[test]
    fn color_checker_arguments() {
        let means = [Bgr::new(10.9, 20.1, 30.5), Bgr::new(0.2, 255.0, 99.99)];
        assert_eq!(
            color_checker_args(&means, Some("  --gain  2 ")),
            ["10", "20", "30", "0", "255", "99", "--gain", "2"]
        );
        assert_eq!(color_checker_args(&means, None).len(), 6);
    }

    #[test]
    fn white_balance_arguments() {
        assert_eq!(
            white_balance_args(Bgr::new(128.7, 64.0, 3.3), Some("camera0")),
            ["128", "64", "3", "camera0"]
        );
        assert_eq!(white_balance_args(Bgr::new(1.0, 2.0, 3.0), Some("")), ["1", "2", "3"]);
    }

    #[cfg(unix)]
    #[test]
    fn tokio_launcher_reports_exit_status() {
        let script = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
        std::fs::write(script.path(), "exit \"$1\"\n").unwrap();
        let launcher = TokioLauncher;
        let run = |code: &str| {
            let handle = launcher
                .launch(&Invocation {
                    program: "sh".into(),
                    args: vec![script.path().display().to_string(), code.into()],
                })
                .unwrap();
            launcher.wait(handle).unwrap()
        };
        assert!(run("0").success());
        assert_eq!(run("3").code(), Some(3));
    }

    #[test]
    fn tokio_launcher_missing_program_is_an_error() {
        let launcher = TokioLauncher;
        let handle = launcher
            .launch(&Invocation {
                program: "/nonexistent/markerdetect-correction".into(),
                args: vec![],
            })
            .unwrap();
        let err = launcher.wait(handle).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        // The detached path only logs
        launcher.invoke(&Invocation {
            program: "/nonexistent/markerdetect-correction".into(),
            args: vec![],
        });
    }

    #[test]
    fn recording_launcher_keeps_order() {
        let launcher = RecordingLauncher::default();
        for program in ["a", "b"] {
            launcher.invoke(&Invocation {
                program: program.into(),
                args: vec![],
            });
        }
        let taken = launcher.take();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[1].program, "b");
        assert!(launcher.take().is_empty());
    }
}
