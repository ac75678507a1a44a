//! Built-in curated content served by the read-only cloud library.

use crate::domain::{BankItem, CloudBook, CloudDeck, DeckCard};

fn card(front: &str, back: &str) -> DeckCard {
  DeckCard { front: front.into(), front_note: None, back: back.into(), back_note: None }
}

fn book_item(id: &str, zh: &str, tag: &str, difficulty: u8) -> BankItem {
  BankItem {
    id: id.into(),
    zh: zh.into(),
    hints: vec![],
    suggestions: vec![],
    tags: vec![tag.into()],
    difficulty,
  }
}

/// Flashcard decks anyone can copy into their own library.
pub fn cloud_decks() -> Vec<CloudDeck> {
  vec![
    CloudDeck {
      id: "starter-phrases",
      name: "Starter Phrases",
      cards: vec![
        card("Hello!", "你好！"),
        card("How are you?", "你最近好嗎？"),
        card("Thank you.", "謝謝你。"),
      ],
    },
    CloudDeck {
      id: "common-errors",
      name: "Common Errors",
      cards: vec![
        card("I look forward to hear from you.", "更自然：I look forward to hearing from you."),
        card("He suggested me to go.", "更自然：He suggested that I go / He suggested going."),
      ],
    },
  ]
}

/// Practice-sentence books, keyed by display name.
pub fn cloud_books() -> Vec<CloudBook> {
  vec![
    CloudBook {
      name: "Daily Conversations",
      items: vec![
        book_item("conv-greet", "跟陌生人打招呼", "daily", 1),
        book_item("conv-order", "點餐時的常見句型", "daily", 2),
      ],
    },
    CloudBook {
      name: "Academic Writing",
      items: vec![
        book_item("acad-intro", "撰寫研究引言", "academic", 3),
        book_item("acad-method", "描述研究方法", "academic", 3),
      ],
    },
  ]
}
