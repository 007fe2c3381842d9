//! Main iced application for the stem mixer
//!
//! Holds the [`PlaybackController`] and maps every UI event to one
//! controller call. Decoding runs on a blocking worker so the window stays
//! responsive while a long file is loaded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use iced::widget::{button, column, container, row, text, Space};
use iced::{time, Center, Element, Length, Subscription, Task, Theme};

use stemsplit_core::audio_file::{decode_file, DecodedAudio, SUPPORTED_EXTENSIONS};
use stemsplit_core::controller::{PlaybackController, SessionEvent};

use super::message::Message;
use super::mixer_view::MixerView;

/// Application state
pub struct MixerApp {
    controller: PlaybackController,
    mixer_view: MixerView,
    /// Name of the loaded file, for the header
    file_name: Option<String>,
    /// A decode is in flight
    loading: bool,
    /// Last status or error message
    status: String,
}

impl MixerApp {
    /// Create the app; `initial_file` (from the command line) starts loading at once
    pub fn new(controller: PlaybackController, initial_file: Option<PathBuf>) -> (Self, Task<Message>) {
        let channels = controller.channels().len();
        let mut app = Self {
            controller,
            mixer_view: MixerView::new(channels),
            file_name: None,
            loading: false,
            status: String::from("Open an audio file to start"),
        };

        let task = match initial_file {
            Some(path) => app.start_decode(path),
            None => Task::none(),
        };
        (app, task)
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                if let Some(SessionEvent::Ended { .. }) = self.controller.sync() {
                    self.status = String::from("Reached end of clip");
                }
                self.mixer_view.update_meters(&self.controller);
            }
            Message::OpenFile => {
                return Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .add_filter("Audio files", &SUPPORTED_EXTENSIONS)
                            .pick_file()
                            .await
                            .map(|f| f.path().to_path_buf())
                    },
                    Message::FileChosen,
                );
            }
            Message::FileChosen(Some(path)) => {
                return self.start_decode(path);
            }
            Message::FileChosen(None) => {}
            Message::AudioDecoded(path, result) => {
                self.loading = false;
                match result {
                    Ok(decoded) => match self.controller.install_audio(decoded) {
                        Ok(info) => {
                            self.file_name = Some(display_name(&path));
                            self.status = format!(
                                "Loaded {:.1}s ({} Hz, {} ch source)",
                                info.duration_seconds, info.source_sample_rate, info.source_channels
                            );
                        }
                        Err(e) => self.report(e),
                    },
                    Err(e) => {
                        log::warn!("Failed to decode {:?}: {}", path, e);
                        self.status = format!("Could not load {}: {}", display_name(&path), e);
                    }
                }
            }
            Message::SetChannelVolume(index, level) => {
                if let Err(e) = self.controller.set_channel_volume(index, level) {
                    self.report(e);
                }
            }
            Message::TogglePlayback => match self.controller.toggle_playback() {
                Ok(state) => {
                    self.status = if state.is_playing() {
                        format!("Playing {} channels", self.controller.live_handles())
                    } else {
                        String::from("Stopped")
                    };
                }
                Err(e) => self.report(e),
            },
            Message::ResetVolumes => {
                self.controller.reset_volumes();
                self.status = String::from("Volumes reset");
            }
        }
        Task::none()
    }

    /// Decode off the UI thread, delivering [`Message::AudioDecoded`]
    fn start_decode(&mut self, path: PathBuf) -> Task<Message> {
        self.loading = true;
        self.status = format!("Loading {}...", display_name(&path));

        let sample_rate = self.controller.sample_rate();
        let task_path = path.clone();
        Task::perform(decode_in_background(task_path, sample_rate), move |result| {
            Message::AudioDecoded(path, result)
        })
    }

    fn report(&mut self, error: impl std::fmt::Display) {
        log::warn!("{}", error);
        self.status = error.to_string();
    }

    pub fn subscription(&self) -> Subscription<Message> {
        // Update meters at ~30fps
        time::every(Duration::from_millis(33)).map(|_| Message::Tick)
    }

    pub fn view(&self) -> Element<'_, Message> {
        let title = text(self.file_name.as_deref().unwrap_or("No file loaded")).size(20);
        let open_btn = button(text("Open…"))
            .on_press_maybe((!self.loading).then_some(Message::OpenFile))
            .padding([6, 14]);
        let header = row![title, Space::new().width(Length::Fill), open_btn]
            .spacing(12)
            .align_y(Center);

        let state = self.controller.playback_state();
        let play_btn = button(text(state.button_label()).size(16))
            .on_press_maybe(
                (self.controller.has_audio() && !self.loading).then_some(Message::TogglePlayback),
            )
            .padding([8, 20]);
        let reset_btn = button(text("Reset")).on_press(Message::ResetVolumes).padding([8, 14]);
        let position = text(format!("{:.1}s", self.controller.position_seconds())).size(13);
        let transport = row![play_btn, reset_btn, Space::new().width(Length::Fill), position]
            .spacing(12)
            .align_y(Center);

        let status = text(&self.status).size(13);

        let content = column![header, self.mixer_view.view(&self.controller), transport, status]
            .spacing(20)
            .padding(20);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    pub fn theme(&self) -> Theme {
        Theme::Dark
    }
}

async fn decode_in_background(path: PathBuf, sample_rate: u32) -> Result<DecodedAudio, String> {
    tokio::task::spawn_blocking(move || decode_file(&path, sample_rate))
        .await
        .map_err(|e| format!("Decode task failed: {}", e))?
        .map_err(|e| e.to_string())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
