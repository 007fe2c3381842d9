//! Channel rows
//!
//! One row per mixer channel:
//! ```text
//! ┌──────────────┬──────────────────────────────┬───────┬──────────┐
//! │ 🥁 Drums     │ ──────────●───────────────── │  72%  │ ▇▇▇▇░░░░ │
//! └──────────────┴──────────────────────────────┴───────┴──────────┘
//! ```
//! The meter shows what the channel contributed to the output, so a muted
//! row stays empty while the others move. A master meter under the rows
//! shows the clipped sum that reaches the device.

use iced::widget::{container, progress_bar, row, slider, text, Column};
use iced::{Center, Element, Length};

use stemsplit_core::controller::PlaybackController;

use super::message::Message;

/// Fraction of the previous meter level kept per tick
const METER_DECAY: f32 = 0.8;

/// Meter state for the channel rows and the master output
pub struct MixerView {
    meters: Vec<f32>,
    master: f32,
}

/// New peak, or the previous level decayed if that is higher
fn decay_toward(level: f32, peak: f32) -> f32 {
    let next = peak.max(level * METER_DECAY);
    if next < 1e-3 {
        0.0
    } else {
        next
    }
}

impl MixerView {
    pub fn new(channels: usize) -> Self {
        Self {
            meters: vec![0.0; channels],
            master: 0.0,
        }
    }

    /// Pull fresh peaks from the controller; levels fall back smoothly
    pub fn update_meters(&mut self, controller: &PlaybackController) {
        for (index, meter) in self.meters.iter_mut().enumerate() {
            *meter = decay_toward(*meter, controller.channel_peak(index));
        }
        self.master = decay_toward(self.master, controller.master_peak());
    }

    pub fn view<'a>(&'a self, controller: &'a PlaybackController) -> Element<'a, Message> {
        let rows = controller
            .channels()
            .iter()
            .enumerate()
            .map(|(index, channel)| {
                let meter = self.meters.get(index).copied().unwrap_or(0.0);
                view_channel(index, channel.spec().display_label(), channel.volume(), meter)
            });

        Column::with_children(rows)
            .push(view_master(self.master))
            .spacing(10)
            .into()
    }
}

fn view_master<'a>(level: f32) -> Element<'a, Message> {
    let name = container(text("Master").size(16)).width(Length::Fill);
    let meter = container(progress_bar(0.0..=1.0, level.min(1.0))).width(Length::Fixed(120.0));

    row![name, meter].spacing(12).align_y(Center).into()
}

fn view_channel<'a>(index: usize, label: String, volume: f32, meter: f32) -> Element<'a, Message> {
    let name = container(text(label).size(16)).width(Length::Fixed(140.0));

    let fader = slider(0.0..=1.0, volume, move |v| Message::SetChannelVolume(index, v))
        .step(0.01)
        .width(Length::Fill);

    let percent = container(text(format!("{:>3.0}%", volume * 100.0)).size(13))
        .width(Length::Fixed(48.0));

    let level = container(progress_bar(0.0..=1.0, meter.min(1.0))).width(Length::Fixed(120.0));

    row![name, fader, percent, level]
        .spacing(12)
        .align_y(Center)
        .into()
}
