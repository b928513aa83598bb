/*!

This is the long-form manual for `delphi_review` and the `delphi` command.

## Rounds, blocks and items

A Delphi round asks a panel of experts to judge a list of questionnaire items.
The items are split into blocks, and each block is evaluated on its own.
For every item the evaluator gives:

* a relevance score on a 5 point Likert scale (1 = not relevant, 5 = very relevant)
* national applicability: `Sim` / `Não`
* item acceptance: `Sim` / `Não`
* an optional comment with suggestions

A comment becomes mandatory depending on the [`CommentPolicy`](crate::CommentPolicy).
With the default policy, it is mandatory when the item is not accepted or not
applicable. The strict policy also requires it for a relevance of 1 or 2.

## Input formats

### Block catalogs

One file per block, named `bloco<N>_itens.csv` (or `.xlsx`, first worksheet).
The first row is a header. Column names are matched case-insensitively after
trimming:

| column      | required | notes                                            |
|-------------|----------|--------------------------------------------------|
| `secao`     | yes      | section of the instrument                        |
| `codigo`    | yes      | item code, unique within the block               |
| `tematica`  | yes      | theme, used for the per-theme summary            |
| `pergunta`  | yes      | the question; `texto` is accepted instead        |
| `respostas` | no       | answer options of the instrument                 |

Any other column is reported and ignored.

### Answer sheets

The `submit` command reads the evaluations from a JSON document:

```json
{
  "evaluator": { "name": "Ana Souza", "email": "ana@example.org", "taxId": "" },
  "consentGiven": true,
  "instructionsAcknowledged": true,
  "evaluations": [
    { "code": "A1", "relevance": 4, "nationalApplicability": "Sim",
      "itemAcceptance": "Não", "comment": "needs rewording" }
  ]
}
```

## Output formats

### Submissions

Each submission is one CSV file, `delphi_{block}_{name}_{YYYYMMDD_HHMMSS}.csv`,
with one row per item and the following columns, in this order:

`bloco, secao, codigo, tematica, pergunta, respostas, grau_relevancia,
aplicabilidade_nacional, aceitacao_item, comentarios_sugestoes, nome, email,
cpf, concordancia_instr_delphi, consentimento, timestamp`

Additional fields follow the fixed columns. Existing files are never overwritten.

### Consolidation

`delphi consolidate` stacks all the submission files and writes:

* `consolidado_respostas.csv`: every row of every readable file
* `resumo_total.csv`: count and percentage per vote (2 decimals, halves
  rounded to even)
* `resumo_tematica.csv`: count per theme and vote
* `resumo_por_item.csv`: count per item and vote
* `consolidado_respostas.xlsx`: the four tables above as the sheets
  `respostas`, `resumo_total`, `resumo_tematica` and `resumo_por_item`

Files that cannot be parsed are skipped with a warning.

## Configuration

All the commands accept `--config path/to/delphi.json`:

```json
{
  "catalogDirectory": "base",
  "outputDirectory": "outputs",
  "submissionPattern": "delphi_*.csv",
  "voteColumn": "voto_delphi",
  "commentPolicy": { "requireOnRejection": true, "requireOnNotApplicable": true, "lowRelevanceMax": 2 },
  "archive": { "kind": "git", "path": "." }
}
```

Relative paths are resolved from the directory of the configuration file.
Command line flags take precedence.

*/
