//! Prompt 模板：{request} {context} {playbook} {answer} {code} {framework} 占位符在调用时替换
//!
//! 替换只扫描模板本身一遍，插入的文本（代码、上下文）里出现的花括号原样保留。

use crate::llm::Message;

pub const STRATEGY_SYSTEM: &str = "You are an expert software engineer who plans before coding.";

pub const STRATEGY_TEMPLATE: &str = "Write a playbook for the user's request: an ordered, numbered list of short, actionable steps that a programmer can follow to fulfil it. Use the context retrieved from their codebase where it is relevant. Output only the numbered list.\n\n--- Context ---\n{context}--- User Request ---\n{request}\n\n--- Playbook ---\n";

pub const ANSWER_SYSTEM: &str = "You are an expert AI programming assistant.";

pub const ANSWER_TEMPLATE: &str = "Answer the user's request by following the steps of the playbook below, using the context retrieved from their codebase.\n\n--- Playbook ---\n{playbook}\n\n--- Context ---\n{context}--- User Request ---\n{request}\n\n--- Answer ---\n";

pub const REFLECTION_SYSTEM: &str = "You are a strict reviewer of programming answers.";

pub const REFLECTION_TEMPLATE: &str = "Rate how well the answer fulfils the user's request, given the retrieved context and the playbook that guided it. Respond with a single number between 0.0 (useless) and 1.0 (perfect) and nothing else.\n\n--- User Request ---\n{request}\n\n--- Context ---\n{context}--- Playbook ---\n{playbook}\n\n--- Answer ---\n{answer}\n\n--- Score ---\n";

pub const TEST_SYSTEM: &str = "You are a QA engineer.";

pub const TEST_TEMPLATE: &str = "Write a unit test for the following function using the {framework} framework.\n\n--- Function to test ---\n{code}\n\n--- Context from codebase ---\n{context}\n--- Test Code ---\n";

/// 单遍填充：只识别模板中的 `{name}`，未知占位符原样输出
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let hit = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match hit {
            Some((close, value)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn strategy_messages(request: &str, context: &str) -> Vec<Message> {
    vec![
        Message::system(STRATEGY_SYSTEM),
        Message::user(fill(
            STRATEGY_TEMPLATE,
            &[("context", context), ("request", request)],
        )),
    ]
}

pub fn answer_messages(request: &str, context: &str, playbook: &str) -> Vec<Message> {
    vec![
        Message::system(ANSWER_SYSTEM),
        Message::user(fill(
            ANSWER_TEMPLATE,
            &[("playbook", playbook), ("context", context), ("request", request)],
        )),
    ]
}

pub fn reflection_messages(
    request: &str,
    context: &str,
    playbook: &str,
    answer: &str,
) -> Vec<Message> {
    vec![
        Message::system(REFLECTION_SYSTEM),
        Message::user(fill(
            REFLECTION_TEMPLATE,
            &[
                ("request", request),
                ("context", context),
                ("playbook", playbook),
                ("answer", answer),
            ],
        )),
    ]
}

pub fn test_messages(code: &str, framework: &str, context: &str) -> Vec<Message> {
    vec![
        Message::system(TEST_SYSTEM),
        Message::user(fill(
            TEST_TEMPLATE,
            &[("framework", framework), ("code", code), ("context", context)],
        )),
    ]
}
