/// Curated French prompts offered by `/surprise`.
pub const SURPRISE_PROMPTS: &[&str] = &[
    "Un astronaute faisant du skate sur les anneaux de Saturne, style cyberpunk",
    "Un petit dragon endormi dans une tasse de café, style Pixar 3D",
    "Portrait d'une guerrière viking avec des peintures de guerre, hyper-réaliste",
    "Un chat samouraï en armure traditionnelle japonaise, style estampe",
    "Une forêt enchantée avec des champignons géants lumineux et des fées",
    "Un vieux renard bibliothécaire portant des lunettes, style peinture à l'huile",
    "Un robot géant rouillé dans un champ de fleurs sauvages, style Ghibli",
    "Le portrait d'un lion fait entièrement de galaxies et de nébuleuses étoilées",
];
