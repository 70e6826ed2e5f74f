//! Strips the exploration transcript down to text before handing it to the
//! synthesis tier (spec §4.5: "ALL screenshots stripped, since the primary
//! model already observed them").

use qa_core::{ContentBlock, Message};

pub fn strip_screenshots(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|message| {
            let stripped: Vec<ContentBlock> = message
                .content()
                .iter()
                .filter(|block| !matches!(block, ContentBlock::Image { .. }))
                .cloned()
                .collect();
            match message {
                Message::User { .. } => Message::User { content: stripped },
                Message::Assistant { .. } => Message::Assistant { content: stripped },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_image_blocks_but_keeps_everything_else() {
        let messages = vec![Message::User {
            content: vec![
                ContentBlock::text("look at this"),
                ContentBlock::image_webp_base64("base64data"),
            ],
        }];
        let stripped = strip_screenshots(&messages);
        assert_eq!(stripped[0].content().len(), 1);
        assert!(matches!(stripped[0].content()[0], ContentBlock::Text { .. }));
    }
}
