use log::debug;

use crate::{fields::FieldMark, types::ConsolidatedAnswer};

/// Decides one answer per question from the marked fields.
///
/// Questions are numbered from 1 to `question_count` and the result is in
/// question order. A question with exactly one marked option takes that
/// option; a question with none, or with more than one, is blank. Marks for
/// questions outside `1..=question_count` are ignored.
pub fn consolidate_answers(marks: &[FieldMark], question_count: u32) -> Vec<ConsolidatedAnswer> {
    let mut answers = vec![ConsolidatedAnswer::Blank; question_count as usize];
    // questions already seen with a mark, so a third mark cannot revive one
    let mut marked = vec![false; question_count as usize];

    for mark in marks.iter().filter(|mark| mark.is_marked) {
        let index = match (mark.label.question as usize).checked_sub(1) {
            Some(index) if index < answers.len() => index,
            _ => continue,
        };

        if marked[index] {
            if !answers[index].is_blank() {
                debug!("question {} has more than one mark", mark.label.question);
            }
            answers[index] = ConsolidatedAnswer::Blank;
        } else {
            marked[index] = true;
            answers[index] = ConsolidatedAnswer::Option(mark.label.option.clone());
        }
    }

    answers
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{template::FieldLabel, types::OptionLabel};

    fn mark(label: &str, is_marked: bool) -> FieldMark {
        FieldMark {
            label: FieldLabel::parse(label).unwrap(),
            fill_ratio: if is_marked { 100.0 } else { 0.0 },
            is_marked,
        }
    }

    fn option(s: &str) -> ConsolidatedAnswer {
        ConsolidatedAnswer::Option(OptionLabel::from(s.to_string()))
    }

    #[test]
    fn single_marks_become_answers() {
        let marks = [
            mark("1-A", true),
            mark("1-B", false),
            mark("2-A", false),
            mark("2-B", true),
        ];
        assert_eq!(consolidate_answers(&marks, 2), vec![option("A"), option("B")]);
    }

    #[test]
    fn double_mark_is_blank() {
        let marks = [
            mark("1-A", true),
            mark("1-B", true),
            mark("2-A", true),
            mark("2-B", false),
        ];
        assert_eq!(
            consolidate_answers(&marks, 2),
            vec![ConsolidatedAnswer::Blank, option("A")]
        );
    }

    #[test]
    fn triple_mark_stays_blank() {
        let marks = [mark("1-A", true), mark("1-B", true), mark("1-C", true)];
        assert_eq!(consolidate_answers(&marks, 1), vec![ConsolidatedAnswer::Blank]);
    }

    #[test]
    fn output_follows_question_number_not_template_order() {
        let marks = [mark("3-C", true), mark("1-A", true), mark("2-B", true)];
        assert_eq!(
            consolidate_answers(&marks, 4),
            vec![option("A"), option("B"), option("C"), ConsolidatedAnswer::Blank]
        );
    }

    #[test]
    fn ignores_questions_out_of_range() {
        let marks = [mark("5-A", true)];
        assert_eq!(consolidate_answers(&marks, 2), vec![ConsolidatedAnswer::Blank; 2]);
        assert!(consolidate_answers(&marks, 0).is_empty());
    }

    const OPTIONS: [&str; 4] = ["A", "B", "C", "D"];

    proptest! {
        #[test]
        fn no_marks_means_all_blank(question_count in 0u32..30) {
            let marks = (1..=question_count)
                .flat_map(|q| OPTIONS.iter().map(move |o| mark(&format!("{}-{}", q, o), false)))
                .collect::<Vec<_>>();
            let answers = consolidate_answers(&marks, question_count);
            prop_assert_eq!(answers.len(), question_count as usize);
            prop_assert!(answers.iter().all(ConsolidatedAnswer::is_blank));
        }

        #[test]
        fn answer_depends_only_on_which_options_are_marked(
            chosen in prop::collection::btree_set(0usize..4, 0..=4),
            order in Just((0..4).collect::<Vec<usize>>()).prop_shuffle(),
        ) {
            let marks = order
                .iter()
                .map(|&i| mark(&format!("1-{}", OPTIONS[i]), chosen.contains(&i)))
                .collect::<Vec<_>>();
            let answers = consolidate_answers(&marks, 1);
            let expected = if chosen.len() == 1 {
                let only = *chosen.iter().next().unwrap();
                option(OPTIONS[only])
            } else {
                ConsolidatedAnswer::Blank
            };
            prop_assert_eq!(&answers[0], &expected);
        }

        #[test]
        fn questions_do_not_interfere(
            first in prop::collection::btree_set(0usize..4, 0..=4),
            second in prop::collection::btree_set(0usize..4, 0..=4),
            second_first in any::<bool>(),
        ) {
            let q1 = (0..4).map(|i| mark(&format!("1-{}", OPTIONS[i]), first.contains(&i)));
            let q2 = (0..4).map(|i| mark(&format!("2-{}", OPTIONS[i]), second.contains(&i)));
            let marks = if second_first {
                q2.chain(q1).collect::<Vec<_>>()
            } else {
                q1.chain(q2).collect::<Vec<_>>()
            };
            let answers = consolidate_answers(&marks, 2);
            prop_assert_eq!(answers[0].is_blank(), first.len() != 1);
            prop_assert_eq!(answers[1].is_blank(), second.len() != 1);
        }
    }
}
