//! Prompt templates for the four AI operations.
//!
//! Each builder is pure string assembly from a typed input record. The
//! rendered prompt instructs the model to answer with a single JSON object;
//! the matching output structs live in `llm::schema`.

pub const DEFAULT_TESTS_FOLDER: &str = "tests";

#[derive(Debug, Clone)]
pub struct LlmPrompt {
    pub system: String,
    pub user: String,
}

/* ============================================================
   Input records
   ============================================================ */

pub struct GenerateRequest<'a> {
    pub cpp_code: &'a str,
    pub yaml_instructions: &'a str,
    pub tests_folder: &'a str,
}

pub struct RefineRequest<'a> {
    pub cpp_code: &'a str,
    pub generated_tests: &'a str,
    pub yaml_config: &'a str,
    pub build_logs: Option<&'a str>,
}

pub struct FixBuildRequest<'a> {
    /// Code under repair. The coordinator passes the current test suite
    /// here, not the original source.
    pub cpp_code: &'a str,
    pub build_logs: &'a str,
    pub yaml_guidelines: &'a str,
}

pub struct OptimizeRequest<'a> {
    pub cpp_code: &'a str,
    pub coverage_report: &'a str,
    pub yaml_instructions: &'a str,
}

/* ============================================================
   generate
   ============================================================ */

pub fn generate(req: &GenerateRequest) -> LlmPrompt {
    let system = r#"
You are a C++ unit test generator. You receive C++ source code and YAML
instructions and produce an initial unit test suite.

Rules:
- Cover the main functionality of the provided code
- Follow the YAML instructions for framework, cases, and naming
- Tests must be deterministic, well-structured, and compilable
- Emit complete test file contents, compatible with a standard C++ testing
  framework (GoogleTest unless the instructions say otherwise)
"#
    .trim()
    .to_string();

    let mut user = String::new();

    user.push_str("C++ SOURCE CODE\n```cpp\n");
    user.push_str(req.cpp_code);
    user.push_str("\n```\n\n");

    user.push_str("YAML INSTRUCTIONS\n```yaml\n");
    user.push_str(req.yaml_instructions);
    user.push_str("\n```\n\n");

    user.push_str(&format!(
        "Generated tests will be saved under the '{}' folder.\n\n",
        req.tests_folder
    ));

    user.push_str(
        "OUTPUT\nRespond with a single JSON object and nothing else:\n\
         {\"generatedTests\": \"<complete test file contents>\"}\n",
    );

    LlmPrompt { system, user }
}

/* ============================================================
   refine
   ============================================================ */

pub fn refine(req: &RefineRequest) -> LlmPrompt {
    let system = r#"
You are a C++ unit test expert. You receive C++ code, an existing unit test
suite, YAML configuration, and optionally build logs.

Rules:
- Remove duplicated tests
- Add missing includes and libraries
- Improve assertion quality and structure
- The refined suite must remain compilable and effectively test the code
- Summarize every change you make in a report
"#
    .trim()
    .to_string();

    let mut user = String::new();

    user.push_str("C++ SOURCE CODE\n```cpp\n");
    user.push_str(req.cpp_code);
    user.push_str("\n```\n\n");

    user.push_str("CURRENT UNIT TESTS\n```cpp\n");
    user.push_str(req.generated_tests);
    user.push_str("\n```\n\n");

    user.push_str("YAML CONFIGURATION\n```yaml\n");
    user.push_str(req.yaml_config);
    user.push_str("\n```\n\n");

    if let Some(logs) = req.build_logs.filter(|l| !l.trim().is_empty()) {
        user.push_str("BUILD LOGS\n```\n");
        user.push_str(logs);
        user.push_str("\n```\n\n");
    }

    user.push_str(
        "OUTPUT\nRespond with a single JSON object and nothing else:\n\
         {\"refinedTests\": \"<refined test file contents>\", \
         \"report\": \"<summary of the changes made>\"}\n",
    );

    LlmPrompt { system, user }
}

/* ============================================================
   fix build
   ============================================================ */

pub fn fix_build(req: &FixBuildRequest) -> LlmPrompt {
    let system = r#"
You are an expert C++ developer specializing in resolving build issues. You
receive C++ code, the build logs it produced, and YAML guidelines.

Rules:
- Diagnose the compiler and linker errors present in the logs
- Correct the code according to the guidelines
- The fixed code must compile without errors
- Explain every change you make
"#
    .trim()
    .to_string();

    let mut user = String::new();

    user.push_str("C++ CODE\n```cpp\n");
    user.push_str(req.cpp_code);
    user.push_str("\n```\n\n");

    user.push_str("BUILD LOGS\n```\n");
    user.push_str(req.build_logs);
    user.push_str("\n```\n\n");

    user.push_str("YAML GUIDELINES\n```yaml\n");
    user.push_str(req.yaml_guidelines);
    user.push_str("\n```\n\n");

    user.push_str(
        "OUTPUT\nRespond with a single JSON object and nothing else:\n\
         {\"fixedCode\": \"<corrected code>\", \
         \"explanation\": \"<explanation of the changes made>\"}\n",
    );

    LlmPrompt { system, user }
}

/* ============================================================
   optimize coverage
   ============================================================ */

pub fn optimize(req: &OptimizeRequest) -> LlmPrompt {
    let system = r#"
You are a C++ test coverage specialist. You receive C++ source code, a
coverage report for its test suite, and YAML instructions.

Rules:
- Identify uncovered functions, branches, and edge cases from the report
- Emit an improved, reformatted test suite that raises coverage
- Keep existing meaningful tests; do not regress covered behavior
- Accompany the suite with concrete suggestions
"#
    .trim()
    .to_string();

    let mut user = String::new();

    user.push_str("C++ SOURCE CODE\n```cpp\n");
    user.push_str(req.cpp_code);
    user.push_str("\n```\n\n");

    user.push_str("COVERAGE REPORT\n```\n");
    user.push_str(req.coverage_report);
    user.push_str("\n```\n\n");

    user.push_str("YAML INSTRUCTIONS\n```yaml\n");
    user.push_str(req.yaml_instructions);
    user.push_str("\n```\n\n");

    user.push_str(
        "OUTPUT\nRespond with a single JSON object and nothing else:\n\
         {\"formattedTests\": \"<improved test file contents>\", \
         \"suggestions\": \"<coverage improvement suggestions>\"}\n",
    );

    LlmPrompt { system, user }
}
