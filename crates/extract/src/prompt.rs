use serde_json::{Value, json};

use crate::llm::ChatMessage;
use crate::schema::EntityField;

const NER_SYSTEM_PROMPT: &str = "你是一个城市规划专家。请从给定文本中提取以下5类实体：\
Location (地点)、Land use function (用地功能)、Direction (方位)、\
Concept (规划概念)、Planned activity (规划行动/动词)。";

const FEW_SHOT_INPUT: &str = "Priority is given to securing development space for advanced \
manufacturing, strategic emerging industry, and urban industry, while promoting the \
construction of value innovation parks.";

fn few_shot_output() -> Value {
    json!({
        "Location": [],
        "Land use function": [
            "advanced manufacturing",
            "strategic emerging industry",
            "urban industry",
            "value innovation park"
        ],
        "Direction": [],
        "Concept": [],
        "Planned activity": ["give priority to", "promote"]
    })
}

/// System prompt, one worked example, then the chunk to label.
pub fn build_ner_messages(chunk_text: &str) -> Vec<ChatMessage> {
    let few_shot = format!(
        "示例输入: \"{}\"\n示例输出(仅JSON): {}",
        FEW_SHOT_INPUT,
        few_shot_output()
    );

    vec![
        ChatMessage::system(NER_SYSTEM_PROMPT),
        ChatMessage::user(few_shot),
        ChatMessage::user(format!("请仅输出标准 JSON。要提取的文本：\n{}", chunk_text)),
    ]
}

/// Dependency and constituency strings of a syntax annotation, under any of
/// the key spellings parsers emit.
fn syntax_strings(syntax: Option<&Value>) -> (String, String) {
    let pick = |keys: &[&str]| {
        syntax
            .and_then(|s| keys.iter().find_map(|k| s.get(*k)))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    };

    (
        pick(&["dep", "dependency"]),
        pick(&["con", "con_pos", "const"]),
    )
}

/// Relation-extraction prompt for one chunk.
///
/// The chunk doubles as paragraph context. Entities, when present, are listed
/// so the model can anchor heads and tails on them.
pub fn build_relation_prompt(
    chunk_text: &str,
    syntax: Option<&Value>,
    entities: Option<&EntityField>,
    core_concepts: &[String],
) -> String {
    let (dep, con) = syntax_strings(syntax);

    let mut prompt = format!(
        "系统：你是一个NLP专家，专注于城市规划领域的关系抽取（RE）任务。\n\
         用户：你的任务是根据提供的信息，在每个输入句子中提取关系三元组。\n\n\
         段落的背景内容：\n{}\n\n\
         句法分析结果：\n\
         依存关系：{}\n\
         成分分析：{}\n\n",
        chunk_text, dep, con
    );

    if let Some(EntityField::Parsed(entities)) = entities {
        prompt.push_str(&format!("已提取实体：{}\n\n", entities));
    }

    prompt.push_str(&format!(
        "任务目标：\n\
         围绕核心概念【{}】进行抽取。请确保提取的三元组中，头实体或尾实体至少有一个与上述核心概念语义高度相关。\n\n\
         实体约束（a1）：\n\
         - 头实体/主语（h/sbj）和尾实体/宾语（t/obj）必须属于以下类别：[地点, 土地使用功能, 方向, 概念]。\n\
         - 关系谓词（r/pred）必须属于：[计划活动, 土地添加] 或同义动作。\n\n\
         输出约束（b1）：\n\
         - 仅输出关系三元组。避免任何附加的解释或描述。\n\
         - 仅输出 JSON 数组，每个三元组为 [主语, 谓语, 宾语]，例如 [[\"政府\", \"加强\", \"基础设施建设\"]]。\n",
        core_concepts.join(", ")
    ));

    prompt
}

pub fn build_relation_messages(
    chunk_text: &str,
    syntax: Option<&Value>,
    entities: Option<&EntityField>,
    core_concepts: &[String],
) -> Vec<ChatMessage> {
    vec![ChatMessage::user(build_relation_prompt(
        chunk_text,
        syntax,
        entities,
        core_concepts,
    ))]
}
