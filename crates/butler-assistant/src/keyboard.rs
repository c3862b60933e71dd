//! Reply keyboard layout.

/// A keyboard as rows of button labels.
pub type Keyboard = Vec<Vec<String>>;

/// Arrange `items` into rows.
///
/// With neither limit every item gets its own row. Otherwise a row is
/// closed when it already holds `columns` items or when adding the next
/// item would bring its total label length to `max_char_len` or more,
/// whichever triggers first. A single item that alone reaches
/// `max_char_len` still gets a row of its own; no row is ever empty.
pub fn gen_keyboard<S: AsRef<str>>(
    items: &[S],
    columns: Option<usize>,
    max_char_len: Option<usize>,
) -> Keyboard {
    let columns = match (columns, max_char_len) {
        (None, None) => 1,
        (Some(n), _) => n.max(1),
        (None, Some(_)) => usize::MAX,
    };
    let max_char_len = max_char_len.unwrap_or(usize::MAX);

    let mut keyboard = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut row_len = 0_usize;
    for item in items {
        let item = item.as_ref();
        let item_len = item.chars().count();
        let full = row.len() >= columns || row_len.saturating_add(item_len) >= max_char_len;
        if full && !row.is_empty() {
            keyboard.push(std::mem::take(&mut row));
            row_len = 0;
        }
        row.push(item.to_owned());
        row_len = row_len.saturating_add(item_len);
    }
    if !row.is_empty() {
        keyboard.push(row);
    }
    keyboard
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn shape(keyboard: &Keyboard) -> Vec<usize> {
        keyboard.iter().map(Vec::len).collect()
    }

    #[test]
    fn no_limits_means_one_column() {
        let keyboard = gen_keyboard(&["a", "b", "c"], None, None);
        assert_eq!(shape(&keyboard), vec![1, 1, 1]);
    }

    #[test]
    fn columns_limit_rows() {
        let keyboard = gen_keyboard(&["a", "b", "c", "d", "e"], Some(2), None);
        assert_eq!(shape(&keyboard), vec![2, 2, 1]);
        assert_eq!(keyboard[2], vec!["e".to_owned()]);
    }

    #[test]
    fn tighter_char_limit_wins_over_columns() {
        // "abcd" + "efgh" reaches 8, so "efgh" starts the next row.
        let keyboard = gen_keyboard(&["abcd", "efgh", "ij"], Some(3), Some(8));
        assert_eq!(shape(&keyboard), vec![1, 2]);
    }

    #[test]
    fn oversized_first_item_does_not_create_empty_row() {
        let keyboard = gen_keyboard(&["a very long label", "b"], None, Some(5));
        assert_eq!(shape(&keyboard), vec![1, 1]);
        assert!(keyboard.iter().all(|row| !row.is_empty()));
    }

    #[test]
    fn empty_input_gives_empty_keyboard() {
        let items: [&str; 0] = [];
        assert!(gen_keyboard(&items, Some(2), None).is_empty());
    }
}
