mod config;
mod consts;
mod driver;
mod io;
mod keyboard;
mod keymap;
mod mouse;
mod pedal;
mod router;
mod session;
mod state;
#[cfg(test)]
mod testing;

use crate::{
    config::config,
    io::{CursorActuator, RawInputSource, VirtualKeyboard, VirtualMouse},
    keyboard::{LinuxInputSource, open_keyboard_devices, open_named_device},
    keymap::KeyMap,
    pedal::{PedalSignal, watch_pedal},
    session::PedalSession,
};
use anyhow::{Result, bail};
use log::{info, warn};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();
    let config = config()?;

    if !config.globals.no_emit && !driver::ensure() {
        bail!("uinput is unavailable");
    }

    let no_emit = config.globals.no_emit;
    let keyboards = open_keyboard_devices(&config.keyboards)?;
    let pedal = open_named_device(&config.pedal.device)?;

    let source: Arc<dyn RawInputSource> = Arc::new(LinuxInputSource::spawn(
        keyboards,
        VirtualKeyboard::create(no_emit)?,
    ));
    let actuator: Arc<dyn CursorActuator> = Arc::new(VirtualMouse::create(no_emit)?);

    let mut session = PedalSession::new(
        Arc::new(KeyMap::default()),
        source,
        actuator,
        config.globals.pedal_tap_time(),
    );

    info!("Waiting for pedal {:?}", config.pedal.key);
    for signal in watch_pedal(pedal, config.pedal.key).iter() {
        match signal {
            PedalSignal::Down => session.start(),
            PedalSignal::Up => {
                session.end();
            }
        }
    }

    warn!("Pedal disconnected");
    Ok(())
}
