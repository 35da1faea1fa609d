use image::{imageops, GrayImage};
use logging_timer::time;
use serde::Serialize;

use crate::{
    image_utils::{ratio, WHITE},
    template::{AnswerTemplate, FieldLabel, FieldRegion},
};

/// How much of one field is inked, and whether that counts as a mark.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMark {
    #[serde(serialize_with = "serialize_label")]
    pub label: FieldLabel,
    /// Percentage of the field's pixels that are ink, to two decimal places.
    pub fill_ratio: f32,
    pub is_marked: bool,
}

fn serialize_label<S>(label: &FieldLabel, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(label)
}

/// Percentage of ink pixels within `region` of `mask`, rounded to two decimal
/// places. The region must lie within the mask.
pub fn fill_ratio(mask: &GrayImage, region: &FieldRegion) -> f32 {
    let field = imageops::crop_imm(mask, region.x, region.y, region.width, region.height).to_image();
    let percent = ratio(&field, &WHITE) as f64 * 100.0;
    ((percent * 100.0).round() / 100.0) as f32
}

/// Scores every field of the template against the mask, in template order.
#[time]
pub fn evaluate_fields(
    mask: &GrayImage,
    template: &AnswerTemplate,
    mark_threshold: f32,
) -> Vec<FieldMark> {
    template
        .fields
        .iter()
        .map(|field| {
            let fill_ratio = fill_ratio(mask, &field.region);
            FieldMark {
                label: field.label.clone(),
                fill_ratio,
                is_marked: fill_ratio >= mark_threshold,
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use proptest::prelude::*;

    use super::*;
    use crate::image_utils::BLACK;

    pub(crate) const TWO_BY_TWO: &str = r#"{
        "fields": [[20, 20, 20, 20], [60, 20, 20, 20], [20, 60, 20, 20], [60, 60, 20, 20]],
        "labels": ["1-A", "1-B", "2-A", "2-B"]
    }"#;

    pub(crate) fn two_by_two() -> AnswerTemplate {
        AnswerTemplate::from_json(TWO_BY_TWO).unwrap()
    }

    /// A mask with the given template fields filled completely.
    pub(crate) fn mask_with_filled(template: &AnswerTemplate, labels: &[&str]) -> GrayImage {
        let size = template.canonical_size;
        let mut mask = GrayImage::from_pixel(size.width, size.height, BLACK);
        for field in &template.fields {
            if labels.contains(&field.label.to_string().as_str()) {
                draw_filled_rect_mut(&mut mask, field.region.to_rect(), WHITE);
            }
        }
        mask
    }

    #[test]
    fn fill_ratio_rounds_to_two_places() {
        let mut mask = GrayImage::new(10, 10);
        let region = FieldRegion {
            x: 0,
            y: 0,
            width: 3,
            height: 1,
        };
        mask.put_pixel(0, 0, Luma([255]));
        assert_eq!(fill_ratio(&mask, &region), 33.33);
        mask.put_pixel(1, 0, Luma([255]));
        assert_eq!(fill_ratio(&mask, &region), 66.67);
    }

    #[test]
    fn classifies_against_threshold() {
        let template = two_by_two();
        let mut mask = mask_with_filled(&template, &["1-A"]);
        // a quarter of 2-B
        draw_filled_rect_mut(
            &mut mask,
            imageproc::rect::Rect::at(60, 60).of_size(20, 5),
            WHITE,
        );

        let marks = evaluate_fields(&mask, &template, 25.0);
        let summary = marks
            .iter()
            .map(|m| (m.label.to_string(), m.fill_ratio, m.is_marked))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                ("1-A".to_string(), 100.0, true),
                ("1-B".to_string(), 0.0, false),
                ("2-A".to_string(), 0.0, false),
                ("2-B".to_string(), 25.0, true),
            ]
        );

        let marks = evaluate_fields(&mask, &template, 45.0);
        assert!(!marks[3].is_marked);
    }

    #[test]
    fn serializes_label_as_string() {
        let template = two_by_two();
        let marks = evaluate_fields(&mask_with_filled(&template, &[]), &template, 45.0);
        let json = serde_json::to_value(&marks[1]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "label": "1-B", "fillRatio": 0.0, "isMarked": false })
        );
    }

    fn region_strategy() -> impl Strategy<Value = FieldRegion> {
        (0u32..380, 0u32..480, 1u32..=20, 1u32..=20).prop_map(|(x, y, width, height)| {
            FieldRegion {
                x,
                y,
                width,
                height,
            }
        })
    }

    proptest! {
        #[test]
        fn blank_mask_has_no_marks(region in region_strategy(), threshold in 0.01f32..=100.0) {
            let mask = GrayImage::new(400, 500);
            prop_assert_eq!(fill_ratio(&mask, &region), 0.0);
            prop_assert!(!(fill_ratio(&mask, &region) >= threshold));
        }

        #[test]
        fn full_region_is_always_marked(region in region_strategy(), threshold in 0.0f32..=100.0) {
            let mut mask = GrayImage::new(400, 500);
            draw_filled_rect_mut(&mut mask, region.to_rect(), WHITE);
            let ratio = fill_ratio(&mask, &region);
            prop_assert_eq!(ratio, 100.0);
            prop_assert!(ratio >= threshold);
        }
    }
}
