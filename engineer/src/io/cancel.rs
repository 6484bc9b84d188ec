//! Cooperative cancellation for the entrypoint subprocess.
//!
//! A [`CancelToken`] is an explicit flag handed to the execute step. When
//! built with [`CancelToken::ctrl_c`], arming it installs a process-wide
//! Ctrl-C listener that sets the flag instead of killing the process. The
//! listener is only installed on first arm, so Ctrl-C keeps its default
//! behavior during earlier steps. It stays bound to the first armed token.

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    listens_for_ctrl_c: bool,
}

impl CancelToken {
    /// Token cancelled only through [`CancelToken::cancel`].
    pub fn manual() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            listens_for_ctrl_c: false,
        }
    }

    /// Token that Ctrl-C cancels once armed.
    pub fn ctrl_c() -> Self {
        Self {
            listens_for_ctrl_c: true,
            ..Self::manual()
        }
    }

    /// Clear any earlier cancellation and start listening for the signal.
    pub fn arm(&self) {
        self.flag.store(false, Ordering::SeqCst);
        if self.listens_for_ctrl_c {
            install_ctrl_c_listener(Arc::clone(&self.flag));
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

fn install_ctrl_c_listener(flag: Arc<AtomicBool>) {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(move || {
        let spawned = thread::Builder::new()
            .name("ctrl-c".to_string())
            .spawn(move || listen(flag));
        if let Err(err) = spawned {
            warn!(err = %err, "failed to start ctrl-c listener");
        }
    });
}

fn listen(flag: Arc<AtomicBool>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            warn!(err = %err, "failed to build signal runtime");
            return;
        }
    };
    runtime.block_on(async move {
        loop {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(err = %err, "ctrl-c listener stopped");
                return;
            }
            debug!("ctrl-c received");
            flag.store(true, Ordering::SeqCst);
        }
    });
}
