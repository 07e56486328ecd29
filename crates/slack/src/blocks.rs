use pitchwatch_core::domain::pitch_slot::PitchSlot;
use serde::Serialize;

use crate::commands::MessageOrigin;

/// Slack rejects section text longer than 3000 characters.
const SECTION_TEXT_LIMIT: usize = 2_900;

pub const NO_NEW_SLOTS_TEXT: &str = "No new slots are available";
pub const NO_SLOTS_TEXT: &str = "No slots are available right now";
pub const NO_POLL_SLOTS_TEXT: &str =
    "No slots available for polling\nTry checking availablity first.";
pub const MISSING_PITCH_SLOT_ID_TEXT: &str =
    "No Pitch-Slot ID found in message. Make sure it is formatted correctly.";
pub const POLL_QUESTION: &str = "Which time(s) works best?";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: "button",
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            url: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// A chat message: `fallback_text` is what notifications and clients without
/// block support show, `blocks` is the rich rendering. A template with no
/// blocks is posted as plain text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    /// One plain-text section per chunk of `lines`, so long slot lists stay
    /// under the section size limit.
    pub fn line_sections(mut self, block_prefix: &str, lines: &[String]) -> Self {
        for (index, chunk) in chunk_lines(lines, SECTION_TEXT_LIMIT).into_iter().enumerate() {
            self.blocks.push(Block::Section {
                block_id: format!("{block_prefix}.{index}"),
                text: TextObject::plain(chunk),
            });
        }
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

fn chunk_lines(lines: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in lines {
        if !current.is_empty() && current.len() + line.len() + 1 > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// `Tue Oct 20<TAB>19:00<TAB>1.5 Hour(s)<TAB>@<TAB>Three Corners<TAB>ID:<TAB>34933-2718281`
pub fn slot_line(entry: &PitchSlot) -> String {
    format!(
        "{}\t{} Hour(s)\t@\t{}\tID:\t{}",
        entry.slot.starts.format("%a %b %-d\t%H:%M"),
        entry.slot.duration_hours(),
        entry.pitch.name,
        entry.id
    )
}

fn slot_lines(entries: &[PitchSlot]) -> Vec<String> {
    entries.iter().map(slot_line).collect()
}

fn joined_text(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}

pub fn plain_message(text: &str) -> MessageTemplate {
    MessageBuilder::new(text)
        .section("pitch.notice.v1", |section| {
            section.plain(text);
        })
        .build()
}

pub fn slot_list_message(entries: &[PitchSlot]) -> MessageTemplate {
    if entries.is_empty() {
        return plain_message(NO_SLOTS_TEXT);
    }

    let lines = slot_lines(entries);
    MessageBuilder::new(joined_text(&lines))
        .line_sections("pitch.slots.list.v1", &lines)
        .context("pitch.slots.hint.v1", |context| {
            context.mrkdwn("Use `checkout <ID>` to get a booking link.");
        })
        .build()
}

/// `None` when there is nothing new and the timer asked: the timer stays
/// quiet instead of posting an empty notice every interval.
pub fn unseen_slots_message(
    entries: &[PitchSlot],
    origin: MessageOrigin,
) -> Option<MessageTemplate> {
    if entries.is_empty() {
        return match origin {
            MessageOrigin::User => Some(plain_message(NO_NEW_SLOTS_TEXT)),
            MessageOrigin::Ticker => None,
        };
    }

    let lines = slot_lines(entries);
    Some(
        MessageBuilder::new(joined_text(&lines))
            .section("pitch.slots.unseen.header.v1", |section| {
                section.mrkdwn(format!("*{} new slot(s) available*", entries.len()));
            })
            .line_sections("pitch.slots.unseen.v1", &lines)
            .build(),
    )
}

/// Text understood by the Simple Poll Slack app. Posted without blocks so it
/// can be copied as-is.
pub fn poll_message(entries: &[PitchSlot]) -> MessageTemplate {
    if entries.is_empty() {
        return plain_message(NO_POLL_SLOTS_TEXT);
    }

    let mut text = format!("/poll '{POLL_QUESTION}' ");
    for entry in entries {
        text.push_str(&format!(" \"{}\" ", slot_line(entry)));
    }
    MessageBuilder::new(text).build()
}

pub fn rules_message(descriptions: &[String]) -> MessageTemplate {
    bullet_message("pitch.rules.v1", "No rules are configured", descriptions)
}

pub fn pitches_message(names: &[String]) -> MessageTemplate {
    bullet_message("pitch.pitches.v1", "No pitches are configured", names)
}

fn bullet_message(block_id: &str, empty_text: &str, items: &[String]) -> MessageTemplate {
    if items.is_empty() {
        return plain_message(empty_text);
    }

    let lines: Vec<String> = items.iter().map(|item| format!("-{item}")).collect();
    MessageBuilder::new(joined_text(&lines)).line_sections(block_id, &lines).build()
}

pub fn checkout_message(entry: &PitchSlot, checkout_url: &str) -> MessageTemplate {
    MessageBuilder::new(checkout_url)
        .section("pitch.checkout.slot.v1", |section| {
            section.plain(slot_line(entry));
        })
        .section("pitch.checkout.link.v1", |section| {
            section.mrkdwn(format!("<{checkout_url}|Book this slot>"));
        })
        .actions("pitch.checkout.actions.v1", |actions| {
            actions.button(
                ButtonElement::new("pitch.checkout.open.v1", "Book")
                    .style(ButtonStyle::Primary)
                    .url(checkout_url),
            );
        })
        .build()
}

pub fn missing_pitch_slot_id_message() -> MessageTemplate {
    plain_message(MISSING_PITCH_SLOT_ID_TEXT)
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("pitch.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("pitch.error.context.v1", |context| {
            context.plain(format!("Request ID: {correlation_id}"));
        })
        .build()
}

pub fn help_message(bot_name: &str) -> MessageTemplate {
    let text = format!(
        "I'm {bot_name}, the football bot. \
         Mention me whenever you want to find pitches to play on.\n\
         @{bot_name} list : List available slots at the monitored pitches\n\
         @{bot_name} unseen : List slots that appeared since the last check\n\
         @{bot_name} help : Bring up this dialogue again\n\
         @{bot_name} rules : Lists the descriptions of the rules currently in effect\n\
         @{bot_name} pitches : Lists the monitored pitches\n\
         @{bot_name} poll : Start a poll with the available slots\n\
         @{bot_name} checkout {{pitch-slot ID}} : Get the checkout link for a slot \
         (pitch-slot ID is listed after each slot)"
    );

    MessageBuilder::new(text.clone())
        .section("pitch.help.summary.v1", |section| {
            section.plain(text);
        })
        .build()
}
