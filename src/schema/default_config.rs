use crate::schema::types::{Block, Field, FieldKind, Schema};

pub const STYLE_FIELD_ID: &str = "style";
pub const DEFAULT_STYLE: &str = "Фотореализм";
pub const CAMERA_BLOCK_ID: &str = "camera_block";

fn field(id: &str, label: &str, kind: FieldKind, placeholder: Option<&str>, options: &[&str]) -> Field {
    Field {
        id: id.to_string(),
        label: label.to_string(),
        kind,
        placeholder: placeholder.map(|value| value.to_string()),
        options: options.iter().map(|value| value.to_string()).collect(),
    }
}

fn suggest(id: &str, label: &str, placeholder: &str, options: &[&str]) -> Field {
    field(id, label, FieldKind::TextWithSuggestions, Some(placeholder), options)
}

fn select(id: &str, label: &str, options: &[&str]) -> Field {
    field(id, label, FieldKind::Select, None, options)
}

pub fn default_schema() -> Schema {
    Schema {
        blocks: vec![
            Block {
                id: "subject_block".to_string(),
                title: "1. Сюжет (База)".to_string(),
                fields: vec![
                    suggest(
                        "subject",
                        "Субъект",
                        "Кто или что в кадре?",
                        &["Портрет девушки", "Футуристический автомобиль", "Кот в костюме"],
                    ),
                    suggest(
                        "action",
                        "Действие",
                        "Что делает?",
                        &["Стоит", "Бежит", "Летит", "Сидит", "Танцует"],
                    ),
                    suggest(
                        "environment",
                        "Окружение",
                        "Где находится?",
                        &["Студийный фон", "Улица", "Космос", "Интерьер", "Природа"],
                    ),
                    select(
                        "time_of_day",
                        "Время суток",
                        &[
                            "Рассвет (Sunrise)",
                            "Полдень (Midday)",
                            "Закат (Sunset)",
                            "Сумерки (Dusk)",
                            "Ночь (Night)",
                        ],
                    ),
                    suggest(
                        "atmosphere",
                        "Атмосфера",
                        "Какое настроение?",
                        &[
                            "Уютная (Cozy)",
                            "Мрачная (Moody)",
                            "Эпичная (Epic)",
                            "Мистическая (Mystic)",
                            "Праздничная (Festive)",
                        ],
                    ),
                ],
            },
            Block {
                id: "style_block".to_string(),
                title: "2. Стилизация (Visuals)".to_string(),
                fields: vec![
                    select(
                        STYLE_FIELD_ID,
                        "Стиль",
                        &[
                            "Фотореализм",
                            "Студийное фото",
                            "3D Рендер (Pixar / Disney)",
                            "Киберпанк",
                            "Аниме / Манга",
                            "Масляная живопись",
                            "Акварельный рисунок",
                            "Карандашный набросок",
                            "Векторная иллюстрация",
                            "Полароид (Винтаж)",
                        ],
                    ),
                    suggest(
                        "materials",
                        "Материалы",
                        "Из чего сделано?",
                        &[
                            "Реалистичная кожа (Human Skin)",
                            "Глянцевый пластик (Glossy Plastic)",
                            "Матовый пластик (Matte Plastic)",
                            "Матовая глина (Clay)",
                            "Шлифованный металл (Brushed Metal)",
                            "Ржавый металл (Rusted Metal)",
                            "Золото / Хром (Gold/Chrome)",
                            "Стекло / Хрусталь (Glass)",
                            "Мягкая ткань / Шелк (Silk/Fabric)",
                            "Грубый камень / Бетон (Concrete)",
                            "Карбон (Carbon Fiber)",
                            "Неоновые трубки (Neon Tubes)",
                            "Мех / Пух (Fur/Fluffy)",
                            "Органическая слизь (Organic Slime)",
                        ],
                    ),
                    suggest(
                        "lighting",
                        "Освещение",
                        "Какой свет?",
                        &[
                            "Мягкий дневной свет (Soft Daylight)",
                            "Студийный свет (Softbox)",
                            "Жесткое солнце (Hard Sunlight)",
                            "Золотой час (Golden Hour)",
                            "Синий час (Blue Hour)",
                            "Кинематографичное (Cinematic/Low key)",
                            "Неоновый свет (Neon)",
                            "Рембрандтовский свет (Rembrandt)",
                            "Объемные лучи (God Rays)",
                        ],
                    ),
                    suggest(
                        "colors",
                        "Цветовая гамма",
                        "Какие цвета?",
                        &[
                            "Теплая / Пастельная (Warm/Pastel)",
                            "Холодная / Мрачная (Cold/Moody)",
                            "Черно-белая (Noir/Monochrome)",
                            "Яркая / Кислотная (Vivid/Acid)",
                            "Приглушенная / Винтажная (Muted/Vintage)",
                            "Teal & Orange (Кино-блокбастер)",
                            "Vaporwave (Розовый/Бирюзовый)",
                            "Готическая (Черный/Красный)",
                            "Землистая (Коричневый/Зеленый)",
                        ],
                    ),
                ],
            },
            Block {
                id: CAMERA_BLOCK_ID.to_string(),
                title: "3. Камера (Camera Tech)".to_string(),
                fields: vec![
                    select(
                        "camera_angle",
                        "Ракурс",
                        &[
                            "На уровне глаз (Eye Level)",
                            "Вид снизу (Low Angle)",
                            "Вид сверху (High Angle)",
                            "Вид с дрона (Bird's Eye)",
                            "Вид с земли (Worm's Eye)",
                            "Вид из глаз (POV)",
                            "Селфи (Selfie)",
                            "Из-за плеча (Over-the-shoulder)",
                            "Голландский угол (Dutch Angle/Tilt)",
                        ],
                    ),
                    select(
                        "shot_size",
                        "Крупность плана",
                        &[
                            "Экстремально крупный (Macro/Eye detail)",
                            "Крупный план (Close-up Face)",
                            "Портрет по плечи (Portrait)",
                            "Средний план (Medium Shot / Waist up)",
                            "Ковбойский план (Knees up)",
                            "Полный рост (Full Body)",
                            "Общий план (Wide Shot)",
                            "Дальний план (Extreme Long Shot)",
                        ],
                    ),
                    select(
                        "focus",
                        "Фокус и Глубина",
                        &[
                            "Размытый фон (Bokeh / f1.8)",
                            "Всё в резкости (Deep Focus / f22)",
                            "Макро-съемка (Macro Lens)",
                            "Тилт-шифт (Tilt-Shift / Miniature effect)",
                            "Размытие в движении (Motion Blur)",
                        ],
                    ),
                ],
            },
            Block {
                id: "text_block".to_string(),
                title: "4. Текст (Typography)".to_string(),
                fields: vec![field(
                    "text_on_photo",
                    "Текст на фото",
                    FieldKind::Text,
                    Some("Надпись на изображении"),
                    &[],
                )],
            },
            Block {
                id: "filters_block".to_string(),
                title: "5. Фильтры (Filters)".to_string(),
                fields: vec![field(
                    "negative_prompt",
                    "Негативный промпт",
                    FieldKind::MultiSelect,
                    Some("Чего НЕ надо?"),
                    &[
                        "Стандартный фильтр (Убрать уродства, мусор, артефакты)",
                        "Без текста (Убрать водяные знаки, подписи, логотипы)",
                        "Только HD (Убрать размытие, шум, низкое качество)",
                        "Анатомический фильтр (Исправить пальцы, лишние конечности — для людей)",
                        "Композиционный (Без обрезки головы, объект в центре)",
                        "Без людей (Только пейзаж/фон)",
                        "Без 3D/Мультяшности (Только фотореализм)",
                    ],
                )],
            },
            Block {
                id: "output_block".to_string(),
                title: "6. Формат (Output)".to_string(),
                fields: vec![
                    select("aspect_ratio", "Соотношение сторон", &["1:1", "3:4", "4:3", "9:16", "16:9"]),
                    select("resolution", "Разрешение", &["1K", "2K", "4K"]),
                    select("orientation", "Ориентация видео", &["9:16", "16:9"]),
                ],
            },
            Block {
                id: "video_block".to_string(),
                title: "7. Видео (Veo)".to_string(),
                fields: vec![field(
                    "video_prompt",
                    "Сценарий",
                    FieldKind::Text,
                    Some("Опишите сцену и движение камеры"),
                    &[],
                )],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::prompt::template::{IMAGE_ORDER, VIDEO_ORDER};

    #[test]
    fn default_schema_has_unique_field_ids() {
        let schema = default_schema();
        let mut seen = HashSet::new();
        for field in schema.fields() {
            assert!(seen.insert(field.id.clone()), "duplicate field id {}", field.id);
        }
    }

    #[test]
    fn default_schema_covers_every_template_field() {
        let schema = default_schema();
        for field_id in IMAGE_ORDER.iter().chain(VIDEO_ORDER.iter()) {
            assert!(
                schema.field(field_id).is_some(),
                "template field {} missing from default schema",
                field_id
            );
        }
    }

    #[test]
    fn style_options_include_the_default() {
        let schema = default_schema();
        let style = schema.field(STYLE_FIELD_ID).expect("style field present");
        assert!(style.options.iter().any(|option| option == DEFAULT_STYLE));
    }

    #[test]
    fn camera_block_keeps_template_order() {
        let schema = default_schema();
        let camera = schema.block(CAMERA_BLOCK_ID).expect("camera block present");
        let ids: Vec<&str> = camera.fields.iter().map(|field| field.id.as_str()).collect();
        assert_eq!(ids, vec!["camera_angle", "shot_size", "focus"]);
    }
}
